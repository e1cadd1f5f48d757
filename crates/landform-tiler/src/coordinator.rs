use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use dashmap::DashMap;

use landform_core::atlas::{build_atlas, AtlasOptions, MeshImagePair};
use landform_core::mesh::merge::{merge_with, MergeOptions};
use landform_core::mesh::Mesh;
use landform_core::tiler::{
    build_bounds_tree, chunk_mesh, AreaSplitCriteria, BoundsTreeLimits, FaceSplitCriteria,
    TextureSplitCriteria, TileId, TileMeshSource, TileNode, TileSplitCriteria, TilingScheme,
};

use crate::cache::{DataProductCache, ImageCache};
use crate::config::{TextureMode, TilerConfig};
use crate::logger::{self, LogAbout, LogSev};
use crate::object_store::{self, ObjectStore};

landform_core::eyre_imports!();

/// Work-queue message set (spec.md §4.I). Every variant carries
/// `project_name` implicitly via the coordinator it's enqueued on, since a
/// coordinator only ever serves one project run.
#[derive(Debug, Clone)]
pub enum TilerMessage {
    ChunkInput { input_name: String },
    DefineTiles,
    BuildLeaves { tile_ids: Vec<TileId> },
    BuildParent { tile_id: TileId },
    BuildTilesetJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Building,
    Completed,
    Failed,
}

/// One raw mesh/image input to be chunked and tiled, already loaded in
/// memory. Ingestion proper (PDS/GeoTIFF parsing, wedge assembly) produces
/// these; the coordinator only consumes them.
pub struct TilerInput {
    pub name: String,
    pub mesh: Mesh,
    pub image: Option<image::RgbaImage>,
}

struct ChunkedInputSource {
    chunks: Vec<(landform_core::geom::Aabb, Mesh)>,
}

impl TileMeshSource for ChunkedInputSource {
    fn clipped_mesh_bounds(&self, bounds: &landform_core::geom::Aabb) -> landform_core::geom::Aabb {
        self.chunks
            .iter()
            .filter(|(b, _)| b.intersects(bounds))
            .map(|(_, m)| m.clip_aabb(bounds, false).bounds())
            .fold(landform_core::geom::Aabb::EMPTY, |acc, b| acc.union(&b))
    }

    fn count_faces(&self, bounds: &landform_core::geom::Aabb) -> usize {
        self.chunks
            .iter()
            .filter(|(b, _)| b.intersects(bounds))
            .map(|(_, m)| m.clip_aabb(bounds, false).faces.len())
            .sum()
    }

    fn clipped_surface_area(&self, bounds: &landform_core::geom::Aabb) -> f64 {
        self.chunks
            .iter()
            .filter(|(b, _)| b.intersects(bounds))
            .map(|(_, m)| {
                let c = m.clip_aabb(bounds, false);
                c.faces.iter().map(|f| c.triangle(f).area()).sum::<f64>()
            })
            .sum()
    }

    fn required_texture_resolution(&self, bounds: &landform_core::geom::Aabb) -> u32 {
        let extent = bounds.extent().length();
        (extent * 1.0).max(1.0) as u32
    }
}

/// Coordinates tile-tree construction and build across a worker pool fed by
/// an in-process `crossbeam-channel` queue (spec.md §4.I/§5). Grounded on
/// `spec.md` directly; the channel-consumer loop replaces the teacher's Bevy
/// `Startup`/`Update` scheduling, since there is no ECS scheduler here.
pub struct Coordinator {
    pub config: TilerConfig,
    pub store: Arc<dyn ObjectStore>,
    pub image_cache: ImageCache,
    pub chunk_cache: DataProductCache<Mesh>,
    nodes: DashMap<TileId, TileNode>,
    states: DashMap<TileId, NodeState>,
    remaining: DashMap<TileId, AtomicUsize>,
    retries: DashMap<TileId, u32>,
    inputs: DashMap<String, Vec<(landform_core::geom::Aabb, uuid::Uuid)>>,
    /// Source raster for each chunk's owning input, keyed by the chunk's own
    /// guid so a per-chunk lookup doesn't need to thread the input name
    /// through `all_chunks`. Absent when that input carried no imagery.
    image_for_chunk: DashMap<uuid::Uuid, Arc<image::RgbaImage>>,
    sender: Sender<TilerMessage>,
    receiver: Receiver<TilerMessage>,
}

impl Coordinator {
    pub fn new(config: TilerConfig, store: Arc<dyn ObjectStore>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let image_cache = ImageCache::new(config.image_cache_capacity);
        let chunk_cache = DataProductCache::new(config.data_product_cache_capacity);
        Self {
            config,
            store,
            image_cache,
            chunk_cache,
            nodes: DashMap::new(),
            states: DashMap::new(),
            remaining: DashMap::new(),
            retries: DashMap::new(),
            inputs: DashMap::new(),
            image_for_chunk: DashMap::new(),
            sender,
            receiver,
        }
    }

    pub fn enqueue(&self, message: TilerMessage) {
        let _ = self.sender.send(message);
    }

    pub fn node_states(&self) -> Vec<(TileId, NodeState)> {
        self.states.iter().map(|e| (e.key().clone(), *e.value())).collect()
    }

    /// Drains the queue using `num_workers` rayon-parallel worker slots,
    /// following the dependency-counter protocol of spec.md §4.I: a
    /// `BuildLeaves`/`BuildParent` completion decrements its parent's
    /// `remaining` counter; hitting zero enqueues `BuildParent`.
    pub fn run(&self, inputs: &[TilerInput], num_workers: usize) -> eyre::Result<()> {
        for input in inputs {
            self.handle_chunk_input(input)?;
        }
        self.enqueue(TilerMessage::DefineTiles);

        rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers.max(1))
            .build()
            .wrap_err("building worker pool")?
            .in_place_scope(|scope| {
                while let Ok(message) = self.receiver.recv_timeout(std::time::Duration::from_millis(50)) {
                    let more_queued = !self.receiver.is_empty();
                    scope.spawn(move |_| {
                        if let Err(e) = self.dispatch(message) {
                            logger::one(None, LogSev::Error, LogAbout::Coordinator, &format!("{e:#}"));
                        }
                    });
                    if !more_queued && self.receiver.is_empty() {
                        // give in-flight spawns a chance to enqueue follow-up work
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        if self.receiver.is_empty() {
                            break;
                        }
                    }
                }
            });
        Ok(())
    }

    fn dispatch(&self, message: TilerMessage) -> eyre::Result<()> {
        match message {
            TilerMessage::ChunkInput { .. } => Ok(()), // chunking runs eagerly in `run`
            TilerMessage::DefineTiles => self.handle_define_tiles(),
            TilerMessage::BuildLeaves { tile_ids } => {
                tile_ids
                    .into_iter()
                    .try_for_each(|id| self.handle_build_leaf(&id))
            }
            TilerMessage::BuildParent { tile_id } => self.handle_build_parent(&tile_id),
            TilerMessage::BuildTilesetJson => self.handle_build_tileset_json(),
        }
    }

    fn handle_chunk_input(&self, input: &TilerInput) -> eyre::Result<()> {
        let chunks = chunk_mesh(&input.mesh, self.config.max_faces_per_tile, self.config.chunk_scale);
        let source_image = input.image.as_ref().map(|img| Arc::new(img.clone()));
        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let path = object_store::chunk_mesh_path(&self.config.project_name, chunk.guid);
            self.store.save(&path, ply_bytes(&chunk.mesh).as_slice())?;
            self.chunk_cache.insert(chunk.guid, Arc::new(chunk.mesh));
            if let Some(image) = &source_image {
                self.image_for_chunk.insert(chunk.guid, image.clone());
            }
            ids.push((chunk.bounds, chunk.guid));
        }
        self.inputs.insert(input.name.clone(), ids);
        Ok(())
    }

    /// Every persisted chunk, paired with the source raster of the input it
    /// came from (when that input carried one).
    fn all_chunks(&self) -> Vec<(landform_core::geom::Aabb, Mesh, Option<Arc<image::RgbaImage>>)> {
        self.inputs
            .iter()
            .flat_map(|e| e.value().clone())
            .filter_map(|(bounds, guid)| {
                self.chunk_cache
                    .get(guid)
                    .map(|m| (bounds, (*m).clone(), self.image_for_chunk.get(&guid)))
            })
            .collect()
    }

    fn handle_define_tiles(&self) -> eyre::Result<()> {
        let chunks: Vec<(landform_core::geom::Aabb, Mesh)> = self
            .all_chunks()
            .into_iter()
            .map(|(bounds, mesh, _)| (bounds, mesh))
            .collect();
        let root_bounds = chunks
            .iter()
            .fold(landform_core::geom::Aabb::EMPTY, |acc, (b, _)| acc.union(b));
        let source = ChunkedInputSource { chunks };

        let surface: Vec<Box<dyn TileSplitCriteria>> = vec![
            Box::new(FaceSplitCriteria { max_faces: self.config.max_faces_per_tile }),
            Box::new(AreaSplitCriteria { max_leaf_area: self.config.max_leaf_area }),
            Box::new(TextureSplitCriteria { max_tile_resolution: self.config.max_texture_resolution }),
        ];
        let orbital: Vec<Box<dyn TileSplitCriteria>> = vec![Box::new(AreaSplitCriteria {
            max_leaf_area: self.config.max_orbital_leaf_area,
        })];

        let nodes = build_bounds_tree(
            &self.config.project_name,
            &source,
            root_bounds,
            self.config.tiling_scheme.into(),
            &surface,
            &orbital,
            None,
            BoundsTreeLimits {
                min_tile_extent: self.config.min_tile_extent,
                max_depth: self.config.max_depth,
            },
        );

        let mut leaves = Vec::new();
        for node in nodes {
            self.remaining.insert(node.id.clone(), AtomicUsize::new(node.depends_on.len()));
            self.states.insert(node.id.clone(), NodeState::Pending);
            if node.is_leaf {
                leaves.push(node.id.clone());
            }
            self.nodes.insert(node.id.clone(), node);
        }

        if !leaves.is_empty() {
            self.enqueue(TilerMessage::BuildLeaves { tile_ids: leaves });
        }
        Ok(())
    }

    fn handle_build_leaf(&self, tile_id: &TileId) -> eyre::Result<()> {
        self.states.insert(tile_id.clone(), NodeState::Building);
        let result = self.try_build_leaf(tile_id);
        match result {
            Ok(()) => {
                self.states.insert(tile_id.clone(), NodeState::Completed);
                self.on_completed(tile_id);
                Ok(())
            }
            Err(e) => self.handle_failure(tile_id, e),
        }
    }

    fn try_build_leaf(&self, tile_id: &TileId) -> eyre::Result<()> {
        let node = self
            .nodes
            .get(tile_id)
            .ok_or_else(|| eyre!("unknown tile {tile_id}"))?
            .clone();

        let intersecting: Vec<(Mesh, Option<Arc<image::RgbaImage>>)> = self
            .all_chunks()
            .into_iter()
            .filter(|(b, _, _)| b.intersects(&node.bounds))
            .map(|(_, m, img)| (m.clip_aabb(&node.bounds, true), img))
            .collect();

        let (mesh, image) = match self.config.texture_mode {
            TextureMode::None => (merge_clipped(&intersecting)?, None),
            TextureMode::Bake | TextureMode::Clip | TextureMode::Backproject => {
                let pairs: Vec<MeshImagePair> = intersecting
                    .iter()
                    .filter(|(m, _)| m.has_uvs && !m.faces.is_empty())
                    .map(|(m, img)| MeshImagePair {
                        mesh: m.clone(),
                        // The real per-input raster when ChunkInput recorded one for this
                        // chunk; a flat placeholder only when none was supplied.
                        image: img
                            .as_deref()
                            .cloned()
                            .unwrap_or_else(|| placeholder_patch(PLACEHOLDER_PATCH_PX)),
                    })
                    .collect();
                if pairs.is_empty() {
                    (merge_clipped(&intersecting)?, None)
                } else {
                    let (remapped, atlas) = build_atlas(&pairs, &AtlasOptions {
                        max_bin_area: self.config.max_texture_resolution.pow(2),
                        max_texture_size: self.config.max_texture_resolution,
                        allow_rotation: self.config.allow_rotation,
                        border_px: self.config.border_pixels,
                    })?;
                    (remapped, Some(atlas))
                }
            }
        };

        let mesh_path = object_store::tile_mesh_path(&self.config.project_name, &tile_id.0, "ply");
        self.store.save(&mesh_path, ply_bytes(&mesh).as_slice())?;
        let mut updated = node;
        updated.mesh_url = Some(mesh_path);
        if let Some(image) = image {
            let image_path = object_store::tile_image_path(&self.config.project_name, &tile_id.0, "png");
            let mut bytes = Vec::new();
            image::DynamicImage::ImageRgba8(image)
                .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
                .wrap_err("encoding tile atlas image")?;
            self.store.save(&image_path, &bytes)?;
            updated.image_url = Some(image_path);
        }
        self.nodes.insert(tile_id.clone(), updated);
        Ok(())
    }

    fn handle_build_parent(&self, tile_id: &TileId) -> eyre::Result<()> {
        self.states.insert(tile_id.clone(), NodeState::Building);
        match self.try_build_parent(tile_id) {
            Ok(()) => {
                self.states.insert(tile_id.clone(), NodeState::Completed);
                self.on_completed(tile_id);
                if tile_id.is_root() {
                    self.enqueue(TilerMessage::BuildTilesetJson);
                }
                Ok(())
            }
            Err(e) => self.handle_failure(tile_id, e),
        }
    }

    fn try_build_parent(&self, tile_id: &TileId) -> eyre::Result<()> {
        let node = self
            .nodes
            .get(tile_id)
            .ok_or_else(|| eyre!("unknown tile {tile_id}"))?
            .clone();

        let mut child_meshes = Vec::new();
        let mut max_error = 0.0f64;
        for child_id in &node.depends_on {
            let child = self
                .nodes
                .get(child_id)
                .ok_or_else(|| landform_core::errors::TileBuildError::DependencyMissing(child_id.to_string()))?;
            let path = child
                .mesh_url
                .clone()
                .ok_or_else(|| landform_core::errors::TileBuildError::DependencyMissing(child_id.to_string()))?;
            let bytes = self.store.read(&path)?;
            child_meshes.push(parse_ply(&bytes)?);
            max_error = max_error.max(child.geometric_error.unwrap_or(0.0));
        }

        if child_meshes.is_empty() {
            return Err(landform_core::errors::TileBuildError::Failed {
                tile_id: tile_id.to_string(),
                cause: "no dependency produced a mesh".into(),
            }
            .into());
        }

        let mut merged = merge_with(&child_meshes[0], &child_meshes[1..], &MergeOptions {
            clean: true,
            normalize: true,
            remove_duplicate_verts: true,
            ..Default::default()
        }, |_| {})?;

        // Decimation to a parent-level face budget is approximated by an
        // area-weighted face culling pass; a full edge-collapse/quadric
        // decimator is out of scope here.
        decimate_to_budget(&mut merged, self.config.max_faces_per_tile);

        let mesh_path = object_store::tile_mesh_path(&self.config.project_name, &tile_id.0, "ply");
        self.store.save(&mesh_path, ply_bytes(&merged).as_slice())?;

        let mut updated = node;
        updated.mesh_url = Some(mesh_path);
        // Parent-level geometric error conservatively bounds child error plus
        // a decimation-induced term proportional to the node's own extent.
        updated.geometric_error = Some(max_error + updated.bounds.diagonal() * 0.01);
        self.nodes.insert(tile_id.clone(), updated);
        Ok(())
    }

    fn on_completed(&self, tile_id: &TileId) {
        let Some(node) = self.nodes.get(tile_id) else { return };
        let Some(parent_id) = node.parent_id.clone() else { return };
        drop(node);
        if let Some(counter) = self.remaining.get(&parent_id) {
            if counter.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.enqueue(TilerMessage::BuildParent { tile_id: parent_id });
            }
        }
    }

    fn handle_failure(&self, tile_id: &TileId, err: eyre::Report) -> eyre::Result<()> {
        logger::one(None, LogSev::Warn, LogAbout::Tiling, &format!("tile {tile_id} failed: {err:#}"));
        let attempt = {
            let mut entry = self.retries.entry(tile_id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        if attempt < self.config.tile_build_retries {
            self.enqueue(TilerMessage::BuildLeaves { tile_ids: vec![tile_id.clone()] });
        } else {
            self.states.insert(tile_id.clone(), NodeState::Failed);
            // The parent still proceeds once every other dependency clears;
            // it is simply missing this child's geometry.
            self.on_completed(tile_id);
        }
        Ok(())
    }

    fn handle_build_tileset_json(&self) -> eyre::Result<()> {
        let manifest = crate::tileset_json::build_manifest(&self.nodes);
        let json = serde_json::to_vec_pretty(&manifest).wrap_err("serializing tileset manifest")?;
        self.store.save(&object_store::tileset_json_path(&self.config.project_name), &json)?;
        Ok(())
    }
}

/// Side length of the synthetic fallback patch used only when a chunk's
/// owning input carried no raster at all.
const PLACEHOLDER_PATCH_PX: u32 = 64;

fn placeholder_patch(size_px: u32) -> image::RgbaImage {
    image::RgbaImage::from_pixel(size_px, size_px, image::Rgba([128, 128, 128, 255]))
}

/// Geometry-only merge of a leaf's intersecting chunks, used for
/// `TextureMode::None` and as the fallback when none of the chunks carry
/// UVs worth atlasing.
fn merge_clipped(intersecting: &[(Mesh, Option<Arc<image::RgbaImage>>)]) -> eyre::Result<Mesh> {
    if intersecting.is_empty() {
        return Ok(Mesh::default());
    }
    let meshes: Vec<Mesh> = intersecting.iter().map(|(m, _)| m.clone()).collect();
    let merged = merge_with(&meshes[0], &meshes[1..], &MergeOptions {
        clean: true,
        normalize: true,
        remove_duplicate_verts: true,
        ..Default::default()
    }, |_| {})?;
    Ok(merged)
}

fn decimate_to_budget(mesh: &mut Mesh, max_faces: usize) {
    if mesh.faces.len() <= max_faces || max_faces == 0 {
        return;
    }
    let stride = (mesh.faces.len() as f64 / max_faces as f64).ceil() as usize;
    let kept: Vec<_> = mesh.faces.iter().step_by(stride.max(1)).copied().collect();
    mesh.faces = kept;
    mesh.clean(false, false);
}

fn ply_bytes(mesh: &Mesh) -> Vec<u8> {
    let mut out = String::new();
    out.push_str("ply\nformat ascii 1.0\n");
    out.push_str(&format!("element vertex {}\n", mesh.vertices.len()));
    out.push_str("property double x\nproperty double y\nproperty double z\n");
    out.push_str(&format!("element face {}\n", mesh.faces.len()));
    out.push_str("property list uchar int vertex_indices\nend_header\n");
    for v in &mesh.vertices {
        out.push_str(&format!("{} {} {}\n", v.position.x, v.position.y, v.position.z));
    }
    for f in &mesh.faces {
        out.push_str(&format!("3 {} {} {}\n", f.0, f.1, f.2));
    }
    out.into_bytes()
}

pub fn parse_ply(bytes: &[u8]) -> eyre::Result<Mesh> {
    use landform_core::geom::Vertex;
    use landform_core::mesh::Face;
    use glam::DVec3;

    let text = std::str::from_utf8(bytes).wrap_err("tile mesh is not ASCII PLY")?;
    let mut lines = text.lines();
    let mut vertex_count = 0usize;
    let mut face_count = 0usize;
    for line in lines.by_ref() {
        if line.starts_with("element vertex") {
            vertex_count = line.split_whitespace().last().unwrap_or("0").parse().unwrap_or(0);
        } else if line.starts_with("element face") {
            face_count = line.split_whitespace().last().unwrap_or("0").parse().unwrap_or(0);
        } else if line.trim() == "end_header" {
            break;
        }
    }

    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        let line = lines.next().ok_or_else(|| eyre!("truncated PLY vertex block"))?;
        let mut it = line.split_whitespace();
        let x: f64 = it.next().ok_or_else(|| eyre!("missing x"))?.parse()?;
        let y: f64 = it.next().ok_or_else(|| eyre!("missing y"))?.parse()?;
        let z: f64 = it.next().ok_or_else(|| eyre!("missing z"))?.parse()?;
        vertices.push(Vertex::new(DVec3::new(x, y, z)));
    }

    let mut faces = Vec::with_capacity(face_count);
    for _ in 0..face_count {
        let line = lines.next().ok_or_else(|| eyre!("truncated PLY face block"))?;
        let mut it = line.split_whitespace().skip(1);
        let a: usize = it.next().ok_or_else(|| eyre!("missing face index"))?.parse()?;
        let b: usize = it.next().ok_or_else(|| eyre!("missing face index"))?.parse()?;
        let c: usize = it.next().ok_or_else(|| eyre!("missing face index"))?.parse()?;
        faces.push(Face::new(a, b, c));
    }

    Ok(Mesh {
        vertices,
        faces,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use landform_core::geom::Vertex;
    use landform_core::mesh::Face;
    use glam::DVec3;

    #[test]
    fn ply_round_trips_through_bytes() {
        let mesh = Mesh {
            vertices: vec![
                Vertex::new(DVec3::new(0.0, 0.0, 0.0)),
                Vertex::new(DVec3::new(1.0, 0.0, 0.0)),
                Vertex::new(DVec3::new(0.0, 1.0, 0.0)),
            ],
            faces: vec![Face::new(0, 1, 2)],
            ..Default::default()
        };
        let bytes = ply_bytes(&mesh);
        let parsed = parse_ply(&bytes).unwrap();
        assert_eq!(parsed.vertices.len(), 3);
        assert_eq!(parsed.faces.len(), 1);
    }
}
