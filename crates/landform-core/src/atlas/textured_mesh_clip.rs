use std::collections::HashMap;

use guillotiere::{size2, AtlasAllocator};
use image::{imageops, Rgba, RgbaImage};
use rstar::{RTree, RTreeObject, AABB};

use crate::errors::AtlasError;
use crate::geom::Triangle;
use crate::mesh::Mesh;

/// One source mesh/texture pair to be combined into a single atlas.
pub struct MeshImagePair {
    pub mesh: Mesh,
    pub image: RgbaImage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasOptions {
    pub max_bin_area: u32,
    pub max_texture_size: u32,
    /// Whether patches may be rotated 90 degrees to pack tighter. Off by
    /// default: rotation can introduce a half-pixel sampling offset at patch
    /// borders that this crate does not yet correct for.
    pub allow_rotation: bool,
    pub border_px: u32,
}

impl Default for AtlasOptions {
    fn default() -> Self {
        Self {
            max_bin_area: 8192 * 8192,
            max_texture_size: 8192,
            allow_rotation: false,
            border_px: 2,
        }
    }
}

struct FaceBox {
    pair_idx: usize,
    face_idx: usize,
    bbox: [f64; 4],
}

impl RTreeObject for FaceBox {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.bbox[0], self.bbox[1]], [self.bbox[2], self.bbox[3]])
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }
    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

struct Patch {
    pair_idx: usize,
    faces: Vec<usize>,
    px_bounds: (u32, u32, u32, u32), // x0, y0, x1, y1, exclusive
}

fn face_pixel_bbox(mesh: &Mesh, face_idx: usize, width: u32, height: u32) -> [f64; 4] {
    let tri = mesh.triangle(&mesh.faces[face_idx]);
    let pts = [tri.v0.uv, tri.v1.uv, tri.v2.uv];
    let xs: Vec<f64> = pts.iter().map(|p| p.x * width as f64).collect();
    let ys: Vec<f64> = pts.iter().map(|p| p.y * height as f64).collect();
    [
        xs.iter().cloned().fold(f64::INFINITY, f64::min),
        ys.iter().cloned().fold(f64::INFINITY, f64::min),
        xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    ]
}

/// Flood-fills connected texture patches within each pair's mesh by
/// UV-space face bounding-box overlap, grounded on the same "connected
/// region via spatial index" shape as `mesh::clean`'s near-vertex merge,
/// applied here in UV/pixel space instead of object space.
fn build_patches(pairs: &[MeshImagePair]) -> Vec<Patch> {
    let mut patches = Vec::new();
    for (pair_idx, pair) in pairs.iter().enumerate() {
        if pair.mesh.faces.is_empty() {
            continue;
        }
        let boxes: Vec<FaceBox> = (0..pair.mesh.faces.len())
            .map(|face_idx| FaceBox {
                pair_idx,
                face_idx,
                bbox: face_pixel_bbox(&pair.mesh, face_idx, pair.image.width(), pair.image.height()),
            })
            .collect();
        let tree = RTree::bulk_load(
            boxes
                .iter()
                .map(|b| FaceBox {
                    pair_idx: b.pair_idx,
                    face_idx: b.face_idx,
                    bbox: b.bbox,
                })
                .collect(),
        );

        let mut uf = UnionFind::new(pair.mesh.faces.len());
        for b in &boxes {
            let envelope = AABB::from_corners([b.bbox[0], b.bbox[1]], [b.bbox[2], b.bbox[3]]);
            for other in tree.locate_in_envelope_intersecting(&envelope) {
                uf.union(b.face_idx, other.face_idx);
            }
        }

        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for face_idx in 0..pair.mesh.faces.len() {
            let root = uf.find(face_idx);
            groups.entry(root).or_default().push(face_idx);
        }

        for faces in groups.into_values() {
            let mut x0 = f64::INFINITY;
            let mut y0 = f64::INFINITY;
            let mut x1 = f64::NEG_INFINITY;
            let mut y1 = f64::NEG_INFINITY;
            for &face_idx in &faces {
                let bb = face_pixel_bbox(&pair.mesh, face_idx, pair.image.width(), pair.image.height());
                x0 = x0.min(bb[0]);
                y0 = y0.min(bb[1]);
                x1 = x1.max(bb[2]);
                y1 = y1.max(bb[3]);
            }
            let px_bounds = (
                x0.floor().max(0.0) as u32,
                y0.floor().max(0.0) as u32,
                (x1.ceil() as u32).min(pair.image.width()).max(x0.floor() as u32 + 1),
                (y1.ceil() as u32).min(pair.image.height()).max(y0.floor() as u32 + 1),
            );
            patches.push(Patch {
                pair_idx,
                faces,
                px_bounds,
            });
        }
    }
    patches
}

fn next_pow2(x: u32) -> u32 {
    let mut v = 1u32;
    while v < x {
        v = v.saturating_mul(2);
    }
    v
}

/// Packs `sizes` (width, height) using `guillotiere`, growing the atlas by
/// doubling whichever dimension is currently smaller until every patch fits
/// or `max_bin_area` is exceeded (spec.md §4.G "grow smaller dimension
/// first").
fn pack(sizes: &[(u32, u32)], opts: &AtlasOptions) -> Result<(Vec<guillotiere::Rectangle>, u32, u32), AtlasError> {
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(sizes[i].0.max(sizes[i].1)));

    let mut w = next_pow2(sizes.iter().map(|s| s.0).max().unwrap_or(1));
    let mut h = next_pow2(sizes.iter().map(|s| s.1).max().unwrap_or(1));

    loop {
        let mut allocator = AtlasAllocator::new(size2(w as i32, h as i32));
        let mut placed = vec![None; sizes.len()];
        let mut ok = true;
        for &i in &order {
            let (pw, ph) = sizes[i];
            match allocator.allocate(size2(pw as i32, ph as i32)) {
                Some(alloc) => placed[i] = Some(alloc.rectangle),
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            return Ok((placed.into_iter().map(|r| r.unwrap()).collect(), w, h));
        }

        if (w as u64) * (h as u64) >= opts.max_bin_area as u64 {
            return Err(AtlasError::PackerExhausted(opts.max_bin_area));
        }
        if w <= h {
            w = (w * 2).min(1 << 20);
        } else {
            h = (h * 2).min(1 << 20);
        }
    }
}

/// Single-pass dilation: any fully transparent pixel adjacent to an opaque
/// one is given that neighbor's color, repeated `iterations` times. Prevents
/// bilinear sampling at patch borders from picking up the sentinel fill.
fn dilate_borders(img: &mut RgbaImage, iterations: u32) {
    for _ in 0..iterations {
        let snapshot = img.clone();
        for y in 0..img.height() {
            for x in 0..img.width() {
                if snapshot.get_pixel(x, y).0[3] != 0 {
                    continue;
                }
                let mut found = None;
                for (dx, dy) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)] {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= img.width() as i32 || ny >= img.height() as i32 {
                        continue;
                    }
                    let p = snapshot.get_pixel(nx as u32, ny as u32);
                    if p.0[3] != 0 {
                        found = Some(*p);
                        break;
                    }
                }
                if let Some(p) = found {
                    img.put_pixel(x, y, Rgba([p.0[0], p.0[1], p.0[2], 255]));
                }
            }
        }
    }
}

/// Clips each input's faces into connected UV patches, bin-packs the patches
/// into one atlas texture, and remaps every face's UVs into the packed
/// layout. Per spec.md §4.G.
pub fn build_atlas(pairs: &[MeshImagePair], opts: &AtlasOptions) -> Result<(Mesh, RgbaImage), AtlasError> {
    if pairs.is_empty() {
        return Err(AtlasError::NoPatches);
    }

    let patches = build_patches(pairs);
    if patches.is_empty() {
        return Err(AtlasError::NoPatches);
    }

    // Single source image, single patch spanning it: no repacking needed.
    if pairs.len() == 1 && patches.len() == 1 {
        let pair = &pairs[0];
        let mut image = pair.image.clone();
        if image.width() > opts.max_texture_size || image.height() > opts.max_texture_size {
            image = imageops::resize(&image, opts.max_texture_size, opts.max_texture_size, imageops::FilterType::Triangle);
        }
        return Ok((pair.mesh.clone(), image));
    }

    let sizes: Vec<(u32, u32)> = patches
        .iter()
        .map(|p| (p.px_bounds.2 - p.px_bounds.0, p.px_bounds.3 - p.px_bounds.1))
        .collect();
    let (rects, atlas_w, atlas_h) = pack(&sizes, opts)?;

    let sentinel = (crate::mesh::merge::INVALID_ATLAS_VALUE * 255.0) as u8;
    let mut atlas = RgbaImage::from_pixel(atlas_w, atlas_h, Rgba([sentinel, sentinel, sentinel, 0]));

    let mut out_triangles: Vec<Triangle> = Vec::new();
    let mut has_normals = false;
    let mut has_colors = false;

    for (patch, rect) in patches.iter().zip(rects.iter()) {
        let pair = &pairs[patch.pair_idx];
        has_normals |= pair.mesh.has_normals;
        has_colors |= pair.mesh.has_colors;

        let (x0, y0, x1, y1) = patch.px_bounds;
        let cropped = imageops::crop_imm(&pair.image, x0, y0, x1 - x0, y1 - y0).to_image();

        let dst_x = rect.min.x as u32;
        let dst_y = rect.min.y as u32;
        for (px, py, pixel) in cropped.enumerate_pixels() {
            atlas.put_pixel(dst_x + px, dst_y + py, *pixel);
        }

        for &face_idx in &patch.faces {
            let mut tri = pair.mesh.triangle(&pair.mesh.faces[face_idx]);
            for v in [&mut tri.v0, &mut tri.v1, &mut tri.v2] {
                let src_px = v.uv.x * pair.image.width() as f64 - x0 as f64;
                let src_py = v.uv.y * pair.image.height() as f64 - y0 as f64;
                v.uv.x = (dst_x as f64 + src_px) / atlas_w as f64;
                v.uv.y = (dst_y as f64 + src_py) / atlas_h as f64;
            }
            out_triangles.push(tri);
        }
    }

    if opts.border_px > 0 {
        dilate_borders(&mut atlas, opts.border_px);
    }

    let mut mesh = Mesh::new();
    mesh.set_triangles(out_triangles);
    mesh.has_uvs = true;
    mesh.has_normals = has_normals;
    mesh.has_colors = has_colors;
    // UV remapping may leave vertices that share a position but now carry
    // different per-patch UVs; clean() will split those back into distinct
    // vertex rows (it dedups on the full attribute tuple, UV included) and
    // drop anything degenerate the patch boundaries introduced.
    mesh.clean(false, true);

    let (final_w, final_h) = (atlas.width().min(opts.max_texture_size), atlas.height().min(opts.max_texture_size));
    if final_w != atlas.width() || final_h != atlas.height() {
        let scale_x = final_w as f64 / atlas.width() as f64;
        let scale_y = final_h as f64 / atlas.height() as f64;
        for v in &mut mesh.vertices {
            v.uv.x *= scale_x;
            v.uv.y *= scale_y;
        }
        atlas = imageops::resize(&atlas, final_w, final_h, imageops::FilterType::Triangle);
    }

    Ok((mesh, atlas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vertex;
    use crate::mesh::Face;
    use glam::{DVec2, DVec3};

    fn textured_vertex(x: f64, y: f64, u: f64, v: f64) -> Vertex {
        Vertex {
            position: DVec3::new(x, y, 0.0),
            normal: DVec3::Z,
            uv: DVec2::new(u, v),
            color: glam::Vec4::ONE,
        }
    }

    fn quad_mesh() -> Mesh {
        Mesh {
            vertices: vec![
                textured_vertex(0.0, 0.0, 0.0, 0.0),
                textured_vertex(1.0, 0.0, 1.0, 0.0),
                textured_vertex(1.0, 1.0, 1.0, 1.0),
                textured_vertex(0.0, 1.0, 0.0, 1.0),
            ],
            faces: vec![Face::new(0, 1, 2), Face::new(0, 2, 3)],
            has_uvs: true,
            ..Default::default()
        }
    }

    #[test]
    fn single_pair_shortcut_preserves_uv_range() {
        let image = RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 255]));
        let pair = MeshImagePair { mesh: quad_mesh(), image };
        let (mesh, atlas) = build_atlas(&[pair], &AtlasOptions::default()).unwrap();
        assert_eq!(atlas.width(), 16);
        for v in &mesh.vertices {
            assert!(v.uv.x >= 0.0 && v.uv.x <= 1.0);
            assert!(v.uv.y >= 0.0 && v.uv.y <= 1.0);
        }
    }

    #[test]
    fn two_disjoint_pairs_pack_without_overlap_and_stay_in_unit_uv() {
        let image_a = RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]));
        let image_b = RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255]));
        let pairs = vec![
            MeshImagePair { mesh: quad_mesh(), image: image_a },
            MeshImagePair { mesh: quad_mesh(), image: image_b },
        ];
        let (mesh, atlas) = build_atlas(&pairs, &AtlasOptions::default()).unwrap();
        assert!(atlas.width() >= 8 && atlas.height() >= 8);
        assert_eq!(mesh.faces.len(), 4);
        for v in &mesh.vertices {
            assert!(v.uv.x >= 0.0 && v.uv.x <= 1.0);
            assert!(v.uv.y >= 0.0 && v.uv.y <= 1.0);
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        let result = build_atlas(&[], &AtlasOptions::default());
        assert!(matches!(result, Err(AtlasError::NoPatches)));
    }
}
