use std::collections::HashMap;

use glam::DVec3;

use crate::mesh::{Face, Mesh};

/// Offset mode for skirt generation. `height` does double duty as both the
/// skirt drop depth and the near-perimeter-vertex merge threshold (see
/// DESIGN.md, Open Question 1) — this is preserved intentionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkirtMode {
    X,
    Y,
    Z,
    Normal,
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct SkirtOptions {
    pub mode: SkirtMode,
    pub rel_height: f64,
    pub min_abs_height: f64,
    pub max_abs_height: f64,
    pub threshold_rel: f64,
    pub invert: bool,
}

/// Arena-indexed undirected incidence structure (spec.md §9: avoid reference
/// cycles by using indices rather than a pointer graph).
struct EdgeGraph {
    /// directed edge (src, dst) -> face that owns it in that winding order
    edge_owner: HashMap<(usize, usize), usize>,
}

impl EdgeGraph {
    fn build(mesh: &Mesh) -> Self {
        let mut edge_owner = HashMap::new();
        for (fi, f) in mesh.faces.iter().enumerate() {
            let idx = f.indices();
            for k in 0..3 {
                let a = idx[k];
                let b = idx[(k + 1) % 3];
                edge_owner.insert((a, b), fi);
            }
        }
        Self { edge_owner }
    }

    /// An edge (a,b) is a boundary edge iff its reverse (b,a) has no owning face.
    fn is_boundary(&self, a: usize, b: usize) -> bool {
        self.edge_owner.contains_key(&(a, b)) && !self.edge_owner.contains_key(&(b, a))
    }

    fn perimeter_vertices(&self, n_verts: usize) -> Vec<bool> {
        let mut on_perimeter = vec![false; n_verts];
        for &(a, b) in self.edge_owner.keys() {
            if self.is_boundary(a, b) {
                on_perimeter[a] = true;
                on_perimeter[b] = true;
            }
        }
        on_perimeter
    }

    fn boundary_edges(&self) -> Vec<(usize, usize)> {
        self.edge_owner
            .keys()
            .copied()
            .filter(|&(a, b)| self.is_boundary(a, b))
            .collect()
    }
}

fn axis_extent(bounds: &crate::geom::Aabb, mode: SkirtMode) -> f64 {
    match mode {
        SkirtMode::X => bounds.extent().x,
        SkirtMode::Y => bounds.extent().y,
        SkirtMode::Z => bounds.extent().z,
        SkirtMode::Normal | SkirtMode::None => bounds.diagonal(),
    }
}

/// Area-weighted average normal of faces incident to `vertex`, within a
/// 2-ring neighborhood of `vertex` in `adjacency`.
fn two_ring_normal(mesh: &Mesh, vertex: usize, adjacency: &HashMap<usize, Vec<usize>>) -> DVec3 {
    let mut acc = DVec3::ZERO;
    if let Some(faces) = adjacency.get(&vertex) {
        for &fi in faces {
            let tri = mesh.triangle(&mesh.faces[fi]);
            acc += tri.normal() * tri.area();
        }
    }
    acc.normalize_or_zero()
}

fn vertex_face_adjacency(mesh: &Mesh) -> HashMap<usize, Vec<usize>> {
    let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
    for (fi, f) in mesh.faces.iter().enumerate() {
        for i in f.indices() {
            adjacency.entry(i).or_default().push(fi);
        }
    }
    adjacency
}

/// Generates a skirt apron along `mesh`'s open boundary edges per spec.md §4.D.
/// Returns a new mesh containing only the skirt geometry (callers join it
/// with the source mesh).
pub fn build_skirt(mesh: &Mesh, opts: &SkirtOptions) -> Mesh {
    if opts.mode == SkirtMode::None || mesh.faces.is_empty() {
        return Mesh::new();
    }

    let graph = EdgeGraph::build(mesh);
    let on_perimeter = graph.perimeter_vertices(mesh.vertices.len());
    let adjacency = vertex_face_adjacency(mesh);

    let extent = axis_extent(&mesh.bounds(), opts.mode);
    let h = (opts.rel_height * extent).clamp(opts.min_abs_height, opts.max_abs_height);
    let sign = if opts.invert { -1.0 } else { 1.0 };

    let offset_for = |vi: usize| -> DVec3 {
        match opts.mode {
            SkirtMode::X => DVec3::X * h * sign,
            SkirtMode::Y => DVec3::Y * h * sign,
            SkirtMode::Z => DVec3::Z * h * sign,
            SkirtMode::Normal => -two_ring_normal(mesh, vi, &adjacency) * h,
            SkirtMode::None => DVec3::ZERO,
        }
    };

    // Skirt vertex records: (perimeter_vertex_index, skirt_position).
    let mut skirt_verts: Vec<(usize, DVec3)> = Vec::new();
    let threshold = opts.threshold_rel * h;

    let mut skirt_of_perimeter: HashMap<usize, usize> = HashMap::new();

    for vi in 0..mesh.vertices.len() {
        if !on_perimeter[vi] {
            continue;
        }
        let perim_pos = mesh.vertices[vi].position;
        let pos = perim_pos + offset_for(vi);

        let reuse = skirt_verts.iter().enumerate().find_map(|(si, &(other_perim, other_pos))| {
            let perim_close = mesh.vertices[other_perim].position.distance(perim_pos) < h;
            let skirt_close = other_pos.distance(pos) < threshold;
            (perim_close || skirt_close).then_some(si)
        });

        let skirt_idx = match reuse {
            Some(si) => si,
            None => {
                skirt_verts.push((vi, pos));
                skirt_verts.len() - 1
            }
        };
        skirt_of_perimeter.insert(vi, skirt_idx);
    }

    let mut out = Mesh {
        has_normals: true,
        has_uvs: mesh.has_uvs,
        has_colors: mesh.has_colors,
        ..Default::default()
    };

    // First append the perimeter vertices themselves (src/dst of each skirt
    // triangle reference the *original* mesh positions), then the skirt
    // vertices, offset accordingly.
    let mut perim_index_map: HashMap<usize, usize> = HashMap::new();
    for &(perim, _) in &skirt_verts {
        perim_index_map.entry(perim).or_insert_with(|| {
            out.vertices.push(mesh.vertices[perim]);
            out.vertices.len() - 1
        });
    }
    let skirt_base = out.vertices.len();
    for &(perim, pos) in &skirt_verts {
        let mut vert = mesh.vertices[perim];
        vert.position = pos;
        vert.normal = DVec3::ZERO;
        out.vertices.push(vert);
    }

    let mut accum_normals = vec![DVec3::ZERO; skirt_verts.len()];

    for (src, dst) in graph.boundary_edges() {
        let (Some(&src_local), Some(&dst_local)) =
            (perim_index_map.get(&src), perim_index_map.get(&dst))
        else {
            continue;
        };
        let svs = skirt_base + skirt_of_perimeter[&src];
        let svd = skirt_base + skirt_of_perimeter[&dst];

        let f1 = Face::new(src_local, svs, dst_local);
        let f2 = Face::new(svs, svd, dst_local);

        let n1 = out.triangle(&f1).normal();
        let n2 = out.triangle(&f2).normal();
        accum_normals[skirt_of_perimeter[&src]] += n1;
        accum_normals[skirt_of_perimeter[&dst]] += n2;

        out.faces.push(f1);
        out.faces.push(f2);
    }

    for (i, n) in accum_normals.into_iter().enumerate() {
        out.vertices[skirt_base + i].normal = n.normalize_or_zero();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vertex;

    fn v(x: f64, y: f64, z: f64) -> Vertex {
        Vertex::new(DVec3::new(x, y, z))
    }

    #[test]
    fn single_triangle_skirt_has_one_triangle_per_edge() {
        let mesh = Mesh {
            vertices: vec![v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0)],
            faces: vec![Face::new(0, 1, 2)],
            ..Default::default()
        };
        let opts = SkirtOptions {
            mode: SkirtMode::Z,
            rel_height: 0.1,
            min_abs_height: 0.01,
            max_abs_height: 10.0,
            threshold_rel: 0.1,
            invert: false,
        };
        let skirt = build_skirt(&mesh, &opts);
        // 3 boundary edges * 2 triangles each.
        assert_eq!(skirt.faces.len(), 6);
    }

    #[test]
    fn no_skirt_mode_produces_empty_mesh() {
        let mesh = Mesh {
            vertices: vec![v(0.0, 0.0, 0.0), v(1.0, 0.0, 0.0), v(0.0, 1.0, 0.0)],
            faces: vec![Face::new(0, 1, 2)],
            ..Default::default()
        };
        let opts = SkirtOptions {
            mode: SkirtMode::None,
            rel_height: 0.1,
            min_abs_height: 0.01,
            max_abs_height: 10.0,
            threshold_rel: 0.1,
            invert: false,
        };
        assert!(build_skirt(&mesh, &opts).faces.is_empty());
    }
}
