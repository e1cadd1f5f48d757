use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// LRU image cache keyed by URL, bounded in entry count (spec.md §5).
/// Grounded on the same `lru::LruCache` usage as
/// `draw_art_static.rs`'s `TileAtlasSet`, generalized into a standalone,
/// `Arc<Mutex<..>>`-wrapped cache shared across worker threads instead of a
/// single-threaded Bevy resource.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<Mutex<LruCache<String, Arc<image::RgbaImage>>>>,
}

impl ImageCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<image::RgbaImage>> {
        self.inner.lock().get(url).cloned()
    }

    pub fn insert(&self, url: String, image: Arc<image::RgbaImage>) {
        self.inner.lock().put(url, image);
    }

    /// Reads through `store` on a miss. `no_cache` skips both the lookup and
    /// the insert, for large one-shot reads (e.g. sparse image chunks) that
    /// would otherwise evict everything else.
    pub fn get_or_load(
        &self,
        url: &str,
        no_cache: bool,
        load: impl FnOnce() -> color_eyre::eyre::Result<image::RgbaImage>,
    ) -> color_eyre::eyre::Result<Arc<image::RgbaImage>> {
        if !no_cache {
            if let Some(img) = self.get(url) {
                return Ok(img);
            }
        }
        let img = Arc::new(load()?);
        if !no_cache {
            self.insert(url.to_string(), img.clone());
        }
        Ok(img)
    }
}

/// LRU cache for intermediate data products (chunk meshes, etc.), keyed by
/// GUID, with the same bounded-count semantics as [`ImageCache`].
#[derive(Clone)]
pub struct DataProductCache<T: Clone + Send + Sync + 'static> {
    inner: Arc<Mutex<LruCache<uuid::Uuid, Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> DataProductCache<T> {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn get(&self, guid: uuid::Uuid) -> Option<Arc<T>> {
        self.inner.lock().get(&guid).cloned()
    }

    pub fn insert(&self, guid: uuid::Uuid, value: Arc<T>) {
        self.inner.lock().put(guid, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_cache_evicts_least_recently_used() {
        let cache = ImageCache::new(2);
        cache.insert("a".into(), Arc::new(image::RgbaImage::new(1, 1)));
        cache.insert("b".into(), Arc::new(image::RgbaImage::new(1, 1)));
        cache.get("a"); // touch a, making b the LRU entry
        cache.insert("c".into(), Arc::new(image::RgbaImage::new(1, 1)));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn data_product_cache_round_trips() {
        let cache: DataProductCache<Vec<u8>> = DataProductCache::new(4);
        let guid = uuid::Uuid::new_v4();
        cache.insert(guid, Arc::new(vec![1, 2, 3]));
        assert_eq!(cache.get(guid).unwrap().as_slice(), &[1, 2, 3]);
    }
}
