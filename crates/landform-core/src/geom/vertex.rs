use glam::{DVec2, DVec3, Vec4};

/// `{position, normal, uv, color}`. Attribute *validity* is tracked per-mesh by
/// presence flags, not per-vertex; a vertex here always carries all four fields,
/// whether or not the owning mesh considers normal/uv/color meaningful.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: DVec3,
    pub normal: DVec3,
    pub uv: DVec2,
    pub color: Vec4,
}

impl Vertex {
    pub fn new(position: DVec3) -> Self {
        Self {
            position,
            normal: DVec3::ZERO,
            uv: DVec2::ZERO,
            color: Vec4::ZERO,
        }
    }

    pub fn with_normal(mut self, normal: DVec3) -> Self {
        self.normal = normal;
        self
    }

    pub fn with_uv(mut self, uv: DVec2) -> Self {
        self.uv = uv;
        self
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    /// Linear interpolation of every attribute by `t` (used at clip edge-crossings).
    pub fn lerp(&self, other: &Vertex, t: f64) -> Vertex {
        Vertex {
            position: self.position.lerp(other.position, t),
            normal: self.normal.lerp(other.normal, t),
            uv: self.uv.lerp(other.uv, t),
            color: self.color.lerp(other.color, t as f32),
        }
    }
}
