use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

landform_core::eyre_imports!();

/// Project-scoped persistence seam: read-mostly after ingestion, writes go
/// through an atomic temp-file-plus-rename save (spec.md §5). Grounded on
/// `uocf::geo::map::MapPlane`'s whole-file load/cache style, generalized
/// from a single UO map file to arbitrary project-relative paths.
pub trait ObjectStore: Send + Sync {
    fn read(&self, relative_path: &str) -> eyre::Result<Vec<u8>>;
    fn save(&self, relative_path: &str, bytes: &[u8]) -> eyre::Result<()>;
    fn exists(&self, relative_path: &str) -> bool;
}

/// Filesystem-backed store rooted at `root`. All saves serialize through a
/// single process-wide lock before the rename, matching spec.md §5's
/// "single process-wide `save_lock` guarding rename to prevent file-in-use
/// races".
pub struct FileObjectStore {
    root: PathBuf,
    save_lock: Mutex<()>,
}

impl FileObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> eyre::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).wrap_err("creating object store root")?;
        Ok(Self {
            root,
            save_lock: Mutex::new(()),
        })
    }

    fn full_path(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }
}

impl ObjectStore for FileObjectStore {
    fn read(&self, relative_path: &str) -> eyre::Result<Vec<u8>> {
        std::fs::read(self.full_path(relative_path)).wrap_err_with(|| format!("reading {relative_path}"))
    }

    fn save(&self, relative_path: &str, bytes: &[u8]) -> eyre::Result<()> {
        let dest = self.full_path(relative_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).wrap_err("creating parent directory")?;
        }

        let _guard = self.save_lock.lock().unwrap();
        let tmp = dest.with_extension(format!(
            "{}.tmp",
            dest.extension().and_then(|e| e.to_str()).unwrap_or("part")
        ));
        {
            let mut f = std::fs::File::create(&tmp).wrap_err("creating temp file")?;
            f.write_all(bytes).wrap_err("writing temp file")?;
            f.sync_all().wrap_err("syncing temp file")?;
        }
        std::fs::rename(&tmp, &dest).wrap_err("renaming temp file into place")?;
        Ok(())
    }

    fn exists(&self, relative_path: &str) -> bool {
        self.full_path(relative_path).exists()
    }
}

pub fn chunk_mesh_path(project: &str, guid: uuid::Uuid) -> String {
    format!("chunk/{project}/{guid}.ply")
}

pub fn tile_mesh_path(project: &str, tile_id: &str, ext: &str) -> String {
    format!("tiles/{project}/{tile_id}.{ext}")
}

pub fn tile_image_path(project: &str, tile_id: &str, ext: &str) -> String {
    format!("tiles/{project}/{tile_id}.{ext}")
}

pub fn tileset_json_path(project: &str) -> String {
    format!("tiles/{project}/tileset.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileObjectStore::new(dir.path()).unwrap();
        store.save("a/b.bin", b"hello").unwrap();
        assert!(store.exists("a/b.bin"));
        assert_eq!(store.read("a/b.bin").unwrap(), b"hello");
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileObjectStore::new(dir.path()).unwrap();
        store.save("x.ply", b"data").unwrap();
        let mut entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        entries.sort();
        assert_eq!(entries, vec![std::ffi::OsString::from("x.ply")]);
    }
}
