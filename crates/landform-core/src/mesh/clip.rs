use crate::geom::{Aabb, Plane};
use crate::mesh::merge;
use crate::mesh::Mesh;

/// `mesh.clip(aabb, normalize)` per spec.md §4.A. For a point cloud, keeps
/// only vertices contained in `aabb`; for a face mesh, clips every face as a
/// standalone triangle against all six half-spaces and rebuilds the soup.
pub fn clip_aabb(mesh: &Mesh, aabb: &Aabb, normalize: bool) -> Mesh {
    let mut out = if mesh.is_point_cloud() {
        let mut m = mesh.clone();
        m.vertices.retain(|v| aabb.contains(v.position));
        m
    } else {
        let triangles = mesh
            .faces
            .iter()
            .flat_map(|f| mesh.triangle(f).clip_aabb(aabb));
        let mut m = Mesh {
            has_normals: mesh.has_normals,
            has_uvs: mesh.has_uvs,
            has_colors: mesh.has_colors,
            ..Default::default()
        };
        m.set_triangles(triangles);
        m
    };

    debug_assert!(
        aabb.fuzzy_contains(&out.bounds(), 1e-5),
        "clip postcondition violated: result bounds exceed clip box"
    );

    if normalize && out.has_normals {
        out.clean(true, false);
    }
    out
}

/// `mesh.cut(aabb)` per spec.md §4.A: the complement of `clip_aabb`.
pub fn cut_aabb(mesh: &Mesh, aabb: &Aabb) -> Mesh {
    if mesh.is_point_cloud() {
        let mut m = mesh.clone();
        m.vertices.retain(|v| !aabb.contains(v.position));
        return m;
    }
    let triangles = mesh
        .faces
        .iter()
        .flat_map(|f| mesh.triangle(f).cut_aabb(aabb));
    let mut m = Mesh {
        has_normals: mesh.has_normals,
        has_uvs: mesh.has_uvs,
        has_colors: mesh.has_colors,
        ..Default::default()
    };
    m.set_triangles(triangles);
    m
}

fn bounds_intersects_plane(bounds: &Aabb, plane: &Plane) -> bool {
    if bounds.is_empty() {
        return false;
    }
    let mut min_d = f64::INFINITY;
    let mut max_d = f64::NEG_INFINITY;
    let corners = [
        glam::DVec3::new(bounds.min.x, bounds.min.y, bounds.min.z),
        glam::DVec3::new(bounds.max.x, bounds.min.y, bounds.min.z),
        glam::DVec3::new(bounds.min.x, bounds.max.y, bounds.min.z),
        glam::DVec3::new(bounds.max.x, bounds.max.y, bounds.min.z),
        glam::DVec3::new(bounds.min.x, bounds.min.y, bounds.max.z),
        glam::DVec3::new(bounds.max.x, bounds.min.y, bounds.max.z),
        glam::DVec3::new(bounds.min.x, bounds.max.y, bounds.max.z),
        glam::DVec3::new(bounds.max.x, bounds.max.y, bounds.max.z),
    ];
    for c in corners {
        let d = plane.signed_distance(c);
        min_d = min_d.min(d);
        max_d = max_d.max(d);
    }
    min_d <= 0.0 && max_d >= 0.0
}

/// `mesh.split_on_plane(plane, check_bounds)` per spec.md §4.A.
pub fn split_on_plane(mesh: &Mesh, plane: &Plane, check_bounds: bool) -> Vec<Mesh> {
    if check_bounds && !bounds_intersects_plane(&mesh.bounds(), plane) {
        return vec![mesh.clone()];
    }

    if mesh.is_point_cloud() {
        let mut below = mesh.clone();
        let mut above = mesh.clone();
        below.vertices = Vec::new();
        above.vertices = Vec::new();
        for v in &mesh.vertices {
            if plane.signed_distance(v.position) < 0.0 {
                below.vertices.push(*v);
            } else {
                above.vertices.push(*v);
            }
        }
        return vec![below, above];
    }

    let below_tris = mesh.faces.iter().flat_map(|f| {
        let flipped = plane.flip();
        mesh.triangle(f).clip_plane(&flipped)
    });
    let above_tris = mesh.faces.iter().flat_map(|f| mesh.triangle(f).clip_plane(plane));

    let mut below = Mesh {
        has_normals: mesh.has_normals,
        has_uvs: mesh.has_uvs,
        has_colors: mesh.has_colors,
        ..Default::default()
    };
    below.set_triangles(below_tris);

    let mut above = Mesh {
        has_normals: mesh.has_normals,
        has_uvs: mesh.has_uvs,
        has_colors: mesh.has_colors,
        ..Default::default()
    };
    above.set_triangles(above_tris);

    vec![below, above]
}

/// Folds `split_on_plane` over `planes`, accumulating the cross product of
/// partitions (e.g. 2 planes yield up to 4 pieces).
pub fn split_on_planes(mesh: &Mesh, planes: &[Plane], check_bounds: bool) -> Vec<Mesh> {
    let mut pieces = vec![mesh.clone()];
    for plane in planes {
        pieces = pieces
            .iter()
            .flat_map(|m| split_on_plane(m, plane, check_bounds))
            .collect();
    }
    pieces
}

/// Splits then rejoins into a single mesh with no triangle straddling the
/// plane, so subsequent clipping against other planes is exact.
pub fn split_and_join_on_plane(mesh: &Mesh, plane: &Plane) -> Mesh {
    let parts = split_on_plane(mesh, plane, true);
    merge::join(&parts, false).expect("splitting a mesh cannot produce attribute mismatches")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vertex;
    use glam::DVec3;
    use crate::mesh::Face;

    fn v(x: f64, y: f64, z: f64) -> Vertex {
        Vertex::new(DVec3::new(x, y, z))
    }

    #[test]
    fn split_symmetry_keeps_halves_on_correct_side() {
        let mesh = Mesh {
            vertices: vec![v(0.0, 0.0, 0.0), v(2.0, 0.0, 0.0), v(0.0, 2.0, 0.0)],
            faces: vec![Face::new(0, 1, 2)],
            ..Default::default()
        };
        let plane = Plane::new(DVec3::new(1.0, 0.0, 0.0), -1.0);
        let parts = mesh.split_on_plane(&plane, true);
        assert_eq!(parts.len(), 2);
        let below = &parts[0];
        let above = &parts[1];
        assert!(below.vertices.iter().all(|vv| vv.position.x <= 1.0 + 1e-9));
        assert!(above.vertices.iter().all(|vv| vv.position.x >= 1.0 - 1e-9));
    }

    #[test]
    fn s2_aabb_clip_of_point_cloud() {
        let mut points = Vec::new();
        for x in 0..10 {
            for y in 0..10 {
                points.push(v(x as f64, y as f64, 0.0));
            }
        }
        let mesh = Mesh {
            vertices: points,
            faces: vec![],
            ..Default::default()
        };
        let aabb = Aabb::new(DVec3::new(2.0, 2.0, -1.0), DVec3::new(5.0, 5.0, 1.0));
        let clipped = mesh.clip_aabb(&aabb, false);
        assert_eq!(clipped.vertices.len(), 16);
    }
}
