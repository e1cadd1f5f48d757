use std::collections::HashSet;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geom::EPS;
use crate::mesh::{Face, Mesh};

/// Per-removal-class counts, used by callers to emit one warning line per class
/// rather than one per removed element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub invalid_faces_removed: usize,
    pub unreferenced_vertices_removed: usize,
    pub identical_faces_removed: usize,
    pub duplicate_vertices_removed: usize,
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

fn is_face_invalid(mesh: &Mesh, face: &Face) -> bool {
    let n = mesh.vertices.len();
    if face.0 >= n || face.1 >= n || face.2 >= n {
        return true;
    }
    if face.is_point_marker() {
        // An isolated-point marker; a degenerate triangle by shape but a
        // deliberate single-vertex record, not cleanup fodder.
        return false;
    }
    if face.is_logically_degenerate() {
        return true;
    }
    if mesh.is_face_geometrically_degenerate(face, EPS) {
        return true;
    }
    if mesh.has_uvs {
        for &i in &face.indices() {
            let uv = mesh.vertices[i].uv;
            if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
                return true;
            }
        }
    }
    false
}

fn remove_invalid_faces(mesh: &mut Mesh) -> usize {
    let before = mesh.faces.len();
    mesh.faces.retain(|f| !is_face_invalid(mesh, f));
    before - mesh.faces.len()
}

fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let mut referenced = vec![false; mesh.vertices.len()];
    for f in &mesh.faces {
        for i in f.indices() {
            referenced[i] = true;
        }
    }
    let mut old_to_new = vec![usize::MAX; mesh.vertices.len()];
    let mut new_vertices = Vec::new();
    for (old, keep) in referenced.iter().enumerate() {
        if *keep {
            old_to_new[old] = new_vertices.len();
            new_vertices.push(mesh.vertices[old]);
        }
    }
    let removed = mesh.vertices.len() - new_vertices.len();
    mesh.vertices = new_vertices;
    for f in &mut mesh.faces {
        *f = Face::new(old_to_new[f.0], old_to_new[f.1], old_to_new[f.2]);
    }
    removed
}

fn remove_identical_faces(mesh: &mut Mesh) -> usize {
    let before = mesh.faces.len();
    let mut seen = HashSet::with_capacity(mesh.faces.len());
    mesh.faces.retain(|f| seen.insert(*f));
    before - mesh.faces.len()
}

fn vertex_key(mesh: &Mesh, v: &crate::geom::Vertex) -> (u64, u64, u64, u64, u64, u64, u32, u32, u32, u32, u32, u32) {
    let b = |x: f64| x.to_bits();
    (
        b(v.position.x),
        b(v.position.y),
        b(v.position.z),
        if mesh.has_normals { b(v.normal.x) } else { 0 },
        if mesh.has_normals { b(v.normal.y) } else { 0 },
        if mesh.has_normals { b(v.normal.z) } else { 0 },
        if mesh.has_uvs { v.uv.x.to_bits() } else { 0 },
        if mesh.has_uvs { v.uv.y.to_bits() } else { 0 },
        if mesh.has_colors { v.color.x.to_bits() } else { 0 },
        if mesh.has_colors { v.color.y.to_bits() } else { 0 },
        if mesh.has_colors { v.color.z.to_bits() } else { 0 },
        if mesh.has_colors { v.color.w.to_bits() } else { 0 },
    )
}

fn remove_duplicate_vertices(mesh: &mut Mesh) -> usize {
    use std::collections::HashMap;
    let mut first_of_key = HashMap::new();
    let mut old_to_new = vec![0usize; mesh.vertices.len()];
    let mut new_vertices = Vec::new();
    for (old, v) in mesh.vertices.iter().enumerate() {
        let key = vertex_key(mesh, v);
        let new_idx = *first_of_key.entry(key).or_insert_with(|| {
            new_vertices.push(*v);
            new_vertices.len() - 1
        });
        old_to_new[old] = new_idx;
    }
    let removed = mesh.vertices.len() - new_vertices.len();
    mesh.vertices = new_vertices;
    for f in &mut mesh.faces {
        *f = Face::new(old_to_new[f.0], old_to_new[f.1], old_to_new[f.2]);
    }
    removed
}

/// `clean(normalize, remove_dup_verts)` per spec.md §4.C.
pub fn clean(mesh: &mut Mesh, normalize: bool, remove_dup_verts: bool) -> CleanReport {
    let mut report = CleanReport::default();

    if !mesh.faces.is_empty() {
        report.invalid_faces_removed += remove_invalid_faces(mesh);
        report.unreferenced_vertices_removed += remove_unreferenced_vertices(mesh);
        report.identical_faces_removed += remove_identical_faces(mesh);
    }

    if remove_dup_verts {
        report.duplicate_vertices_removed += remove_duplicate_vertices(mesh);
        if !mesh.faces.is_empty() {
            report.invalid_faces_removed += remove_invalid_faces(mesh);
            report.identical_faces_removed += remove_identical_faces(mesh);
        }
    }

    if normalize && mesh.has_normals {
        for v in &mut mesh.vertices {
            let len = v.normal.length();
            if len > EPS {
                v.normal /= len;
            }
        }
    }

    report
}

/// R-tree pass: each vertex queries the tree within `eps`; first match wins,
/// otherwise the vertex is inserted. Rewrites faces against the resulting map.
pub fn merge_nearby_vertices(mesh: &mut Mesh, eps: f64) {
    let mut tree: RTree<IndexedPoint> = RTree::new();
    let mut old_to_new = vec![0usize; mesh.vertices.len()];
    let mut new_vertices = Vec::new();

    for (old, v) in mesh.vertices.iter().enumerate() {
        let pos = [v.position.x, v.position.y, v.position.z];
        let existing = tree
            .locate_within_distance(pos, eps * eps)
            .min_by(|a, b| {
                a.distance_2(&pos)
                    .partial_cmp(&b.distance_2(&pos))
                    .unwrap()
            })
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

    mesh.vertices = new_vertices;
    for f in &mut mesh.faces {
        *f = Face::new(old_to_new[f.0], old_to_new[f.1], old_to_new[f.2]);
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

/// Keeps only the connected components (by shared face edges) whose size is
/// at least `min_ratio * max component size`; `min_ratio >= 1` keeps only the
/// single largest.
pub fn remove_islands(mesh: &mut Mesh, min_ratio: f64, use_vertex_count: bool) {
    if mesh.faces.is_empty() {
        return;
    }
    let mut uf = UnionFind::new(mesh.vertices.len());
    for f in &mesh.faces {
        uf.union(f.0, f.1);
        uf.union(f.1, f.2);
    }

    let mut component_vertices: std::collections::HashMap<usize, Vec<usize>> = Default::default();
    for i in 0..mesh.vertices.len() {
        let root = uf.find(i);
        component_vertices.entry(root).or_default().push(i);
    }

    let component_size = |verts: &[usize]| -> f64 {
        if use_vertex_count {
            verts.len() as f64
        } else {
            let bounds = crate::geom::Aabb::from_points(verts.iter().map(|&i| mesh.vertices[i].position));
            bounds.diagonal()
        }
    };

    let max_size = component_vertices
        .values()
        .map(|v| component_size(v))
        .fold(0.0_f64, f64::max);

    let keep_roots: HashSet<usize> = if min_ratio >= 1.0 {
        component_vertices
            .iter()
            .max_by(|a, b| component_size(a.1).partial_cmp(&component_size(b.1)).unwrap())
            .map(|(root, _)| *root)
            .into_iter()
            .collect()
    } else {
        component_vertices
            .iter()
            .filter(|(_, verts)| component_size(verts) >= min_ratio * max_size)
            .map(|(root, _)| *root)
            .collect()
    };

    mesh.faces
        .retain(|f| keep_roots.contains(&uf.find(f.0)));
    remove_unreferenced_vertices(mesh);
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
    fn clean_drops_degenerate_face() {
        let mut mesh = Mesh {
            vertices: vec![v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0)],
            faces: vec![Face::new(0, 0, 1)],
            ..Default::default()
        };
        mesh.clean(false, false);
        assert!(mesh.faces.is_empty());
        assert!(mesh.vertices.is_empty());
    }

    #[test]
    fn duplicate_vertices_differing_only_in_blue_or_alpha_are_kept_distinct() {
        let mut mesh = Mesh {
            vertices: vec![
                Vertex { color: glam::Vec4::new(1.0, 1.0, 0.0, 1.0), ..v(0.0, 0.0, 0.0) },
                Vertex { color: glam::Vec4::new(1.0, 1.0, 1.0, 1.0), ..v(0.0, 0.0, 0.0) },
                Vertex { color: glam::Vec4::new(1.0, 1.0, 0.0, 0.5), ..v(0.0, 0.0, 0.0) },
            ],
            faces: vec![],
            has_colors: true,
            ..Default::default()
        };
        mesh.clean(false, true);
        assert_eq!(mesh.vertices.len(), 3);
    }

    #[test]
    fn merge_nearby_vertices_dedupes_within_epsilon() {
        let mut mesh = Mesh {
            vertices: vec![v(0.0, 0.0, 0.0), v(1e-7, 0.0, 0.0), v(5.0, 5.0, 5.0)],
            faces: vec![Face::new(0, 1, 2)],
            ..Default::default()
        };
        mesh.merge_nearby_vertices(1e-4);
        assert_eq!(mesh.vertices.len(), 2);
    }
}
