use uuid::Uuid;

use crate::geom::Aabb;
use crate::mesh::Mesh;
use crate::tiler::bounds_tree::{build_bounds_tree, BoundsTreeLimits, FaceSplitCriteria, TileMeshSource, TileSplitCriteria, TilingScheme};

/// One chunk produced from an input mesh, keyed by the persisted GUID that
/// the input record's `chunk_ids` field is updated with (spec.md §4.I).
#[derive(Debug, Clone)]
pub struct MeshChunk {
    pub guid: Uuid,
    pub bounds: Aabb,
    pub mesh: Mesh,
}

/// A fixed-extension pixel tile cut from a sparse (very large) source image.
#[derive(Debug, Clone)]
pub struct ImageChunk {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub image: image::RgbaImage,
}

struct SingleMeshSource<'a> {
    mesh: &'a Mesh,
}

impl TileMeshSource for SingleMeshSource<'_> {
    fn clipped_mesh_bounds(&self, bounds: &Aabb) -> Aabb {
        self.mesh.clip_aabb(bounds, false).bounds()
    }

    fn count_faces(&self, bounds: &Aabb) -> usize {
        self.mesh.clip_aabb(bounds, false).faces.len()
    }

    fn clipped_surface_area(&self, bounds: &Aabb) -> f64 {
        let clipped = self.mesh.clip_aabb(bounds, false);
        clipped.faces.iter().map(|f| clipped.triangle(f).area()).sum()
    }

    fn required_texture_resolution(&self, _bounds: &Aabb) -> u32 {
        0
    }
}

/// `ChunkInput(input_name)`: runs the bounds-tree builder with loose,
/// chunk-scale limits (a multiple of the final per-tile face budget) and
/// turns every resulting leaf into a persisted chunk sub-mesh.
pub fn chunk_mesh(mesh: &Mesh, target_faces_per_tile: usize, chunk_scale: usize) -> Vec<MeshChunk> {
    if mesh.faces.is_empty() {
        return Vec::new();
    }
    let source = SingleMeshSource { mesh };
    let root_bounds = mesh.bounds();
    let criteria: Vec<Box<dyn TileSplitCriteria>> = vec![Box::new(FaceSplitCriteria {
        max_faces: target_faces_per_tile * chunk_scale,
    })];
    let nodes = build_bounds_tree(
        "chunk",
        &source,
        root_bounds,
        TilingScheme::Octree,
        &criteria,
        &criteria,
        None,
        BoundsTreeLimits {
            min_tile_extent: 0.0,
            max_depth: 32,
        },
    );

    nodes
        .into_iter()
        .filter(|n| n.is_leaf)
        .map(|n| MeshChunk {
            guid: Uuid::new_v4(),
            bounds: n.bounds,
            mesh: mesh.clip_aabb(&n.bounds, true),
        })
        .collect()
}

/// Splits a large sparse image into fixed-size pixel chunks (default
/// 2048 px per spec.md §4.I/§6), named by their chunk coordinates.
pub fn chunk_sparse_image(image: &image::RgbaImage, extension_px: u32) -> Vec<ImageChunk> {
    let mut out = Vec::new();
    let (w, h) = (image.width(), image.height());
    let mut y = 0;
    while y < h {
        let height = extension_px.min(h - y);
        let mut x = 0;
        while x < w {
            let width = extension_px.min(w - x);
            let tile = image::imageops::crop_imm(image, x, y, width, height).to_image();
            out.push(ImageChunk {
                x,
                y,
                width,
                height,
                image: tile,
            });
            x += extension_px;
        }
        y += extension_px;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vertex;
    use crate::mesh::Face;
    use glam::DVec3;

    fn grid_mesh(n: usize) -> Mesh {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for r in 0..n {
            for c in 0..n {
                let base = vertices.len();
                vertices.push(Vertex::new(DVec3::new(c as f64, r as f64, 0.0)));
                vertices.push(Vertex::new(DVec3::new(c as f64 + 1.0, r as f64, 0.0)));
                vertices.push(Vertex::new(DVec3::new(c as f64, r as f64 + 1.0, 0.0)));
                faces.push(Face::new(base, base + 1, base + 2));
            }
        }
        Mesh {
            vertices,
            faces,
            ..Default::default()
        }
    }

    #[test]
    fn chunking_covers_whole_mesh_bounds() {
        let mesh = grid_mesh(8);
        let chunks = chunk_mesh(&mesh, 4, 10);
        assert!(!chunks.is_empty());
        let union = chunks.iter().fold(Aabb::EMPTY, |acc, c| acc.union(&c.bounds));
        let mesh_bounds = mesh.bounds();
        assert!((union.min - mesh_bounds.min).length() < 1e-6);
        assert!((union.max - mesh_bounds.max).length() < 1e-6);
    }

    #[test]
    fn sparse_image_chunking_tiles_exactly() {
        let image = image::RgbaImage::from_pixel(5000, 3000, image::Rgba([0, 0, 0, 255]));
        let chunks = chunk_sparse_image(&image, 2048);
        // ceil(5000/2048)=3, ceil(3000/2048)=2
        assert_eq!(chunks.len(), 6);
        for chunk in &chunks {
            assert!(chunk.width <= 2048 && chunk.height <= 2048);
        }
    }
}
