mod aabb;
mod plane;
mod triangle;
mod vertex;

pub use aabb::Aabb;
pub use plane::Plane;
pub use triangle::Triangle;
pub use vertex::Vertex;

pub use glam::{DMat4, DVec2, DVec3, DVec4};

/// Default fuzzy-comparison epsilon used across geometry and mesh-cleaning code.
pub const EPS: f64 = 1e-9;

pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

pub fn vec3_approx_eq(a: DVec3, b: DVec3, eps: f64) -> bool {
    approx_eq(a.x, b.x, eps) && approx_eq(a.y, b.y, eps) && approx_eq(a.z, b.z, eps)
}
