use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::errors::MeshError;
use crate::mesh::{Face, Mesh};

/// `0.3` per band, written unconditionally into zero-valued atlas pixels so
/// downstream samplers can detect holes. Do not change this constant: callers
/// of `merge_meshes_and_textures` depend on it as a sentinel.
pub const INVALID_ATLAS_VALUE: f32 = 0.3;

/// `merge.join(meshes, clone)`: first non-empty mesh becomes the aggregate,
/// subsequent meshes are appended with index-offset faces. No deduplication.
pub fn join(meshes: &[Mesh], _clone: bool) -> Result<Mesh, MeshError> {
    let mut iter = meshes.iter().filter(|m| !m.vertices.is_empty() || !m.faces.is_empty());
    let Some(first) = iter.next() else {
        return Ok(Mesh::new());
    };
    let mut agg = first.clone();

    for m in iter {
        if (m.has_normals && !agg.has_normals)
            || (m.has_uvs && !agg.has_uvs)
            || (m.has_colors && !agg.has_colors)
        {
            return Err(MeshError::AttributeMismatch(
                "source mesh carries an attribute the aggregate does not".into(),
            ));
        }
        let offset = agg.vertices.len();
        agg.vertices.extend(m.vertices.iter().copied());
        agg.faces.extend(m.faces.iter().map(|f| f.offset(offset)));
    }

    Ok(agg)
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub clean: bool,
    pub normalize: bool,
    pub remove_duplicate_verts: bool,
    pub unique_colors: bool,
    pub merge_nearby_vertices: f64,
}

struct IndexedPoint {
    idx: usize,
    pos: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pos)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.pos[0] - point[0];
        let dy = self.pos[1] - point[1];
        let dz = self.pos[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Assigns `n` evenly spaced hues around the color wheel, used by
/// `unique_colors` to visually distinguish each input mesh after merge.
fn hue_color(i: usize, n: usize) -> glam::Vec4 {
    let h = if n == 0 { 0.0 } else { i as f32 / n as f32 * 6.0 };
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    glam::Vec4::new(r, g, b, 1.0)
}

/// `merge.merge_with(other_meshes, options)` per spec.md §4.B.
pub fn merge_with(
    base: &Mesh,
    other_meshes: &[Mesh],
    options: &MergeOptions,
    mut after_each: impl FnMut(usize),
) -> Result<Mesh, MeshError> {
    let mut inputs = Vec::with_capacity(other_meshes.len() + 1);
    inputs.push(base.clone());
    inputs.extend(other_meshes.iter().cloned());

    if options.unique_colors {
        let n = inputs.len();
        for (i, m) in inputs.iter_mut().enumerate() {
            let color = hue_color(i, n);
            for v in &mut m.vertices {
                v.color = color;
            }
            m.has_colors = true;
        }
    }

    let mut agg = join(&inputs, false)?;

    if options.merge_nearby_vertices > 0.0 {
        // Self-merge first to populate the tree with the aggregate's own
        // vertices, then (implicitly, since everything is already joined)
        // the same pass dedupes cross-input near-duplicates.
        let eps = options.merge_nearby_vertices;
        let mut tree: RTree<IndexedPoint> = RTree::new();
        let mut old_to_new = vec![0usize; agg.vertices.len()];
        let mut new_vertices = Vec::new();
        for (old, v) in agg.vertices.iter().enumerate() {
            let pos = [v.position.x, v.position.y, v.position.z];
            let existing = tree
                .locate_within_distance(pos, eps * eps)
                .min_by(|a, b| a.distance_2(&pos).partial_cmp(&b.distance_2(&pos)).unwrap())
                .map(|p| p.idx);
            let new_idx = match existing {
                Some(idx) => idx,
                None => {
                    let idx = new_vertices.len();
                    new_vertices.push(*v);
                    tree.insert(IndexedPoint { idx, pos });
                    idx
                }
            };
            old_to_new[old] = new_idx;
        }
        agg.vertices = new_vertices;
        for f in &mut agg.faces {
            *f = Face::new(old_to_new[f.0], old_to_new[f.1], old_to_new[f.2]);
        }
    }

    for i in 0..inputs.len() {
        after_each(i);
    }

    if options.clean || options.remove_duplicate_verts {
        agg.clean(options.normalize, options.remove_duplicate_verts);
    } else if options.normalize {
        agg.clean(true, false);
    }

    Ok(agg)
}

/// One textured-mesh input to `merge_meshes_and_textures`.
pub struct TexturedMeshPair {
    pub mesh: Mesh,
    pub image: image::RgbaImage,
}

/// `merge_meshes_and_textures(pairs)` per spec.md §4.B: assembles a grid
/// atlas (`cols = floor(sqrt(N))`, `rows = ceil(N / cols)`) and remaps each
/// input's UVs linearly into its grid cell.
pub fn merge_meshes_and_textures(pairs: &[TexturedMeshPair]) -> Result<(Mesh, image::RgbaImage), MeshError> {
    let n = pairs.len();
    if n == 0 {
        return Ok((Mesh::new(), image::RgbaImage::new(1, 1)));
    }

    let bands: Vec<usize> = pairs.iter().map(|p| bands_of(&p.image)).collect();
    let max_bands = bands.iter().copied().max().unwrap_or(4);
    for &b in &bands {
        if b != max_bands && b != 1 {
            return Err(MeshError::BandMismatch(b, max_bands));
        }
    }

    let cols = (n as f64).sqrt().floor().max(1.0) as u32;
    let rows = (n as u32).div_ceil(cols);

    let cell_w = pairs.iter().map(|p| p.image.width()).max().unwrap_or(1);
    let cell_h = pairs.iter().map(|p| p.image.height()).max().unwrap_or(1);

    let atlas_w = cell_w * cols;
    let atlas_h = cell_h * rows;
    let sentinel = (INVALID_ATLAS_VALUE * 255.0) as u8;
    let mut atlas = image::RgbaImage::from_pixel(atlas_w, atlas_h, image::Rgba([sentinel, sentinel, sentinel, sentinel]));

    let mut out_meshes = Vec::with_capacity(n);
    for (i, pair) in pairs.iter().enumerate() {
        let col = (i as u32) % cols;
        let row = (i as u32) / cols;
        let ox = col * cell_w;
        let oy = row * cell_h;

        let promoted = promote_bands(&pair.image, bands[i], max_bands);
        for (x, y, px) in promoted.enumerate_pixels() {
            if *px != image::Rgba([0, 0, 0, 0]) {
                atlas.put_pixel(ox + x, oy + y, *px);
            }
        }

        let u0 = ox as f64 / atlas_w as f64;
        let v0 = oy as f64 / atlas_h as f64;
        let u1 = (ox + pair.image.width()) as f64 / atlas_w as f64;
        let v1 = (oy + pair.image.height()) as f64 / atlas_h as f64;

        let mut m = pair.mesh.clone();
        for v in &mut m.vertices {
            v.uv.x = u0 + v.uv.x * (u1 - u0);
            v.uv.y = v0 + v.uv.y * (v1 - v0);
        }
        m.has_uvs = true;
        out_meshes.push(m);
    }

    let merged = join(&out_meshes, false)?;
    Ok((merged, atlas))
}

/// Real band count of a decoded raster: 1 when every pixel is fully opaque
/// gray (a single-band product decoded into RGBA), 2 for gray-plus-alpha, 3
/// for opaque color, 4 for color-plus-alpha.
fn bands_of(img: &image::RgbaImage) -> usize {
    let mut has_color = false;
    let mut has_alpha = false;
    for px in img.pixels() {
        let image::Rgba([r, g, b, a]) = *px;
        has_color |= r != g || g != b;
        has_alpha |= a != 255;
        if has_color && has_alpha {
            break;
        }
    }
    match (has_color, has_alpha) {
        (false, false) => 1,
        (false, true) => 2,
        (true, false) => 3,
        (true, true) => 4,
    }
}

/// Promotes a 1-band (gray) image to `to_bands` by replicating its luma
/// across every color channel; any other source band count is returned
/// unchanged (mismatches besides 1-band are rejected before this runs).
fn promote_bands(img: &image::RgbaImage, from_bands: usize, to_bands: usize) -> image::RgbaImage {
    if from_bands != 1 || to_bands <= 1 {
        return img.clone();
    }
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let image::Rgba([r, _, _, a]) = *px;
        *px = image::Rgba([r, r, r, a]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vertex;
    use glam::DVec3;

    fn v(x: f64, y: f64, z: f64) -> Vertex {
        Vertex::new(DVec3::new(x, y, z))
    }

    #[test]
    fn join_offsets_face_indices() {
        let a = Mesh {
            vertices: vec![v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0)],
            faces: vec![Face::new(0, 1, 2)],
            ..Default::default()
        };
        let b = a.clone();
        let joined = join(&[a, b], false).unwrap();
        assert_eq!(joined.vertices.len(), 6);
        assert_eq!(joined.faces, vec![Face::new(0, 1, 2), Face::new(3, 4, 5)]);
    }

    #[test]
    fn join_is_associative_under_relabeling() {
        let a = Mesh {
            vertices: vec![v(0.0, 0.0, 0.0)],
            faces: vec![],
            ..Default::default()
        };
        let b = Mesh {
            vertices: vec![v(1.0, 0.0, 0.0)],
            faces: vec![],
            ..Default::default()
        };
        let c = Mesh {
            vertices: vec![v(2.0, 0.0, 0.0)],
            faces: vec![],
            ..Default::default()
        };
        let left = join(&[join(&[a.clone(), b.clone()], false).unwrap(), c.clone()], false).unwrap();
        let right = join(&[a, join(&[b, c], false).unwrap()], false).unwrap();
        assert_eq!(left.vertices.len(), right.vertices.len());
        let mut lp: Vec<_> = left.vertices.iter().map(|v| v.position.x).collect();
        let mut rp: Vec<_> = right.vertices.iter().map(|v| v.position.x).collect();
        lp.sort_by(|a, b| a.partial_cmp(b).unwrap());
        rp.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(lp, rp);
    }

    #[test]
    fn s4_merge_with_near_vertex_dedup() {
        // Two unit cubes sharing a face, vertices offset by 1e-6.
        let cube = |offset: f64| -> Mesh {
            let s = 1.0;
            let pts = [
                (0.0, 0.0, 0.0), (s, 0.0, 0.0), (s, s, 0.0), (0.0, s, 0.0),
                (0.0, 0.0, s), (s, 0.0, s), (s, s, s), (0.0, s, s),
            ];
            let vertices = pts.iter().map(|&(x, y, z)| v(x + offset, y, z)).collect();
            let idx = [
                (0,1,2),(0,2,3),(4,6,5),(4,7,6),
                (0,4,5),(0,5,1),(3,2,6),(3,6,7),
                (1,5,6),(1,6,2),(0,3,7),(0,7,4),
            ];
            Mesh { vertices, faces: idx.iter().map(|&(a,b,c)| Face::new(a,b,c)).collect(), ..Default::default() }
        };
        let a = cube(0.0);
        let b = cube(1.0 - 1e-6);
        let options = MergeOptions { merge_nearby_vertices: 1e-4, clean: true, ..Default::default() };
        let mut merged = merge_with(&a, &[b], &options, |_| {}).unwrap();
        assert_eq!(merged.vertices.len(), 12);
        let faces_after_first_clean = merged.faces.len();
        merged.clean(false, false);
        assert_eq!(merged.faces.len(), faces_after_first_clean, "clean should yield no further changes");
    }

    #[test]
    fn bands_of_detects_gray_color_and_alpha() {
        let gray = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 10, 10, 255]));
        let gray_alpha = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 10, 10, 200]));
        let color = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        let color_alpha = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 200]));
        assert_eq!(bands_of(&gray), 1);
        assert_eq!(bands_of(&gray_alpha), 2);
        assert_eq!(bands_of(&color), 3);
        assert_eq!(bands_of(&color_alpha), 4);
    }

    #[test]
    fn merge_meshes_and_textures_promotes_gray_into_color_atlas() {
        let tri = Mesh {
            vertices: vec![
                {
                    let mut v = v(0.0, 0.0, 0.0);
                    v.uv = glam::DVec2::new(0.0, 0.0);
                    v
                },
                {
                    let mut v = v(1.0, 0.0, 0.0);
                    v.uv = glam::DVec2::new(1.0, 0.0);
                    v
                },
                {
                    let mut v = v(0.0, 1.0, 0.0);
                    v.uv = glam::DVec2::new(0.0, 1.0);
                    v
                },
            ],
            faces: vec![Face::new(0, 1, 2)],
            has_uvs: true,
            ..Default::default()
        };
        let gray_pair = TexturedMeshPair {
            mesh: tri.clone(),
            image: image::RgbaImage::from_pixel(2, 2, image::Rgba([42, 42, 42, 255])),
        };
        let color_pair = TexturedMeshPair {
            mesh: tri,
            image: image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255])),
        };
        let (merged, atlas) = merge_meshes_and_textures(&[gray_pair, color_pair]).unwrap();
        assert_eq!(merged.faces.len(), 2);
        assert!(atlas.pixels().any(|p| *p == image::Rgba([42, 42, 42, 255])));
    }

    #[test]
    fn merge_meshes_and_textures_rejects_incompatible_band_counts() {
        let tri = Mesh {
            vertices: vec![v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0)],
            faces: vec![Face::new(0, 1, 2)],
            has_uvs: true,
            ..Default::default()
        };
        let color_pair = TexturedMeshPair {
            mesh: tri.clone(),
            image: image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255])),
        };
        let color_alpha_pair = TexturedMeshPair {
            mesh: tri,
            image: image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 200])),
        };
        let err = merge_meshes_and_textures(&[color_pair, color_alpha_pair]).unwrap_err();
        assert!(matches!(err, MeshError::BandMismatch(3, 4)));
    }
}
