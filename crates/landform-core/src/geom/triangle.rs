use smallvec::SmallVec;

use super::{Aabb, Plane, Vertex};

/// A standalone triangle carrying full vertex attributes, so clipping can
/// interpolate normals/UVs/colors at new edge-crossings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vertex,
    pub v1: Vertex,
    pub v2: Vertex,
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self { v0, v1, v2 }
    }

    pub fn verts(&self) -> [Vertex; 3] {
        [self.v0, self.v1, self.v2]
    }

    pub fn area(&self) -> f64 {
        0.5 * (self.v1.position - self.v0.position)
            .cross(self.v2.position - self.v0.position)
            .length()
    }

    pub fn normal(&self) -> glam::DVec3 {
        (self.v1.position - self.v0.position)
            .cross(self.v2.position - self.v0.position)
            .normalize_or_zero()
    }

    /// Clips against a single half-space `dot(p, plane.normal) + plane.d >= 0`.
    /// Returns 0, 1, or 2 triangles, preserving winding.
    pub fn clip_plane(&self, plane: &Plane) -> SmallVec<[Triangle; 2]> {
        let verts = self.verts();
        let dist = verts.map(|v| plane.signed_distance(v.position));

        if dist.iter().all(|&d| d >= 0.0) {
            let mut out = SmallVec::new();
            out.push(*self);
            return out;
        }
        if dist.iter().all(|&d| d < 0.0) {
            return SmallVec::new();
        }

        // Sutherland-Hodgman against a single plane, walking the triangle's
        // edges in winding order and inserting an interpolated vertex at
        // every sign change.
        let mut poly: SmallVec<[Vertex; 4]> = SmallVec::new();
        for i in 0..3 {
            let cur = verts[i];
            let next = verts[(i + 1) % 3];
            let d_cur = dist[i];
            let d_next = dist[(i + 1) % 3];

            if d_cur >= 0.0 {
                poly.push(cur);
            }
            if (d_cur >= 0.0) != (d_next >= 0.0) {
                let t = d_cur / (d_cur - d_next);
                poly.push(cur.lerp(&next, t));
            }
        }

        let mut out = SmallVec::new();
        if poly.len() == 3 {
            out.push(Triangle::new(poly[0], poly[1], poly[2]));
        } else if poly.len() == 4 {
            out.push(Triangle::new(poly[0], poly[1], poly[2]));
            out.push(Triangle::new(poly[0], poly[2], poly[3]));
        }
        out
    }

    fn box_planes(aabb: &Aabb) -> [Plane; 6] {
        use glam::DVec3;
        [
            Plane::new(DVec3::new(1.0, 0.0, 0.0), -aabb.min.x),
            Plane::new(DVec3::new(-1.0, 0.0, 0.0), aabb.max.x),
            Plane::new(DVec3::new(0.0, 1.0, 0.0), -aabb.min.y),
            Plane::new(DVec3::new(0.0, -1.0, 0.0), aabb.max.y),
            Plane::new(DVec3::new(0.0, 0.0, 1.0), -aabb.min.z),
            Plane::new(DVec3::new(0.0, 0.0, -1.0), aabb.max.z),
        ]
    }

    /// Clips against all six axis-aligned half-spaces of `aabb`.
    pub fn clip_aabb(&self, aabb: &Aabb) -> Vec<Triangle> {
        let mut remaining = vec![*self];
        for plane in Self::box_planes(aabb) {
            remaining = remaining
                .iter()
                .flat_map(|t| t.clip_plane(&plane))
                .collect();
        }
        remaining
    }

    /// Returns the complement of `clip_aabb`: the union of the six half-space
    /// *outside* clips, each taken against what already passed every
    /// previous plane's inside test so the six contributions are disjoint.
    pub fn cut_aabb(&self, aabb: &Aabb) -> Vec<Triangle> {
        let mut remaining = vec![*self];
        let mut outside = Vec::new();
        for plane in Self::box_planes(aabb) {
            let flipped = plane.flip();
            for t in &remaining {
                outside.extend(t.clip_plane(&flipped));
            }
            remaining = remaining
                .iter()
                .flat_map(|t| t.clip_plane(&plane))
                .collect();
        }
        outside
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn v(x: f64, y: f64, z: f64) -> Vertex {
        Vertex::new(DVec3::new(x, y, z))
    }

    #[test]
    fn s1_plane_split_single_triangle() {
        // spec.md S1: triangle (0,0,0),(2,0,0),(0,2,0) clipped against {normal=(1,0,0), d=-1}.
        let tri = Triangle::new(v(0.0, 0.0, 0.0), v(2.0, 0.0, 0.0), v(0.0, 2.0, 0.0));
        let plane = Plane::new(DVec3::new(1.0, 0.0, 0.0), -1.0);
        let above = tri.clip_plane(&plane);
        let below = tri.clip_plane(&plane.flip());

        let area: f64 = above.iter().map(|t| t.area()).sum::<f64>()
            + below.iter().map(|t| t.area()).sum::<f64>();
        assert!((area - 2.0).abs() < 1e-9);
        assert_eq!(above.len() + below.len(), 3);
    }

    #[test]
    fn clip_idempotent() {
        let tri = Triangle::new(v(0.0, 0.0, 0.0), v(2.0, 0.0, 0.0), v(0.0, 2.0, 0.0));
        let aabb = Aabb::new(DVec3::new(0.0, 0.0, -1.0), DVec3::new(1.0, 1.0, 1.0));
        let once = tri.clip_aabb(&aabb);
        let twice: Vec<Triangle> = once.iter().flat_map(|t| t.clip_aabb(&aabb)).collect();
        let area_once: f64 = once.iter().map(|t| t.area()).sum();
        let area_twice: f64 = twice.iter().map(|t| t.area()).sum();
        assert!((area_once - area_twice).abs() < 1e-9);
    }

    #[test]
    fn clip_cut_duality_covers_original_area() {
        let tri = Triangle::new(v(0.0, 0.0, 0.0), v(2.0, 0.0, 0.0), v(0.0, 2.0, 0.0));
        let aabb = Aabb::new(DVec3::new(0.0, 0.0, -1.0), DVec3::new(1.0, 1.0, 1.0));
        let clip_area: f64 = tri.clip_aabb(&aabb).iter().map(|t| t.area()).sum();
        let cut_area: f64 = tri.cut_aabb(&aabb).iter().map(|t| t.area()).sum();
        assert!((clip_area + cut_area - tri.area()).abs() < 1e-9);
    }
}
