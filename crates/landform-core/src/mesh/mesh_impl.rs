use crate::geom::{Aabb, Plane, Triangle, Vertex};
use crate::mesh::clean::{self, CleanReport};
use crate::mesh::clip;
use crate::mesh::Face;

/// `{vertices, faces, has_normals, has_uvs, has_colors}`. A mesh with zero
/// faces is a point cloud; clip/cut treat it by point-in-box filtering only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    pub has_normals: bool,
    pub has_uvs: bool,
    pub has_colors: bool,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_point_cloud(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| v.position))
    }

    /// Geometric degeneracy: triangle area below epsilon or a non-finite normal.
    pub fn is_face_geometrically_degenerate(&self, face: &Face, eps: f64) -> bool {
        let tri = self.triangle(face);
        tri.area() < eps || !tri.normal().is_finite()
    }

    pub fn triangle(&self, face: &Face) -> Triangle {
        Triangle::new(
            self.vertices[face.0],
            self.vertices[face.1],
            self.vertices[face.2],
        )
    }

    /// Replaces `faces`/`vertices` with a fresh soup built from `triangles`,
    /// renumbering vertex indices from scratch (used after clip/cut passes).
    pub fn set_triangles(&mut self, triangles: impl IntoIterator<Item = Triangle>) {
        self.vertices.clear();
        self.faces.clear();
        for tri in triangles {
            let base = self.vertices.len();
            self.vertices.push(tri.v0);
            self.vertices.push(tri.v1);
            self.vertices.push(tri.v2);
            self.faces.push(Face::new(base, base + 1, base + 2));
        }
    }

    pub fn clip_aabb(&self, aabb: &Aabb, normalize: bool) -> Mesh {
        clip::clip_aabb(self, aabb, normalize)
    }

    pub fn cut_aabb(&self, aabb: &Aabb) -> Mesh {
        clip::cut_aabb(self, aabb)
    }

    pub fn split_on_plane(&self, plane: &Plane, check_bounds: bool) -> Vec<Mesh> {
        clip::split_on_plane(self, plane, check_bounds)
    }

    pub fn split_on_planes(&self, planes: &[Plane], check_bounds: bool) -> Vec<Mesh> {
        clip::split_on_planes(self, planes, check_bounds)
    }

    pub fn split_and_join_on_plane(&self, plane: &Plane) -> Mesh {
        clip::split_and_join_on_plane(self, plane)
    }

    pub fn clean(&mut self, normalize: bool, remove_dup_verts: bool) -> CleanReport {
        clean::clean(self, normalize, remove_dup_verts)
    }

    pub fn merge_nearby_vertices(&mut self, eps: f64) {
        clean::merge_nearby_vertices(self, eps)
    }

    pub fn remove_islands(&mut self, min_ratio: f64, use_vertex_count: bool) {
        clean::remove_islands(self, min_ratio, use_vertex_count)
    }
}
