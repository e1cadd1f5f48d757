mod cahv;
mod cahvor;
mod cahvore;
mod gis;
mod ortho;

pub use cahv::Cahv;
pub use cahvor::Cahvor;
pub use cahvore::Cahvore;
pub use gis::GisProjector;
pub use ortho::Orthographic;

use glam::{DVec2, DVec3};

use crate::errors::CameraModelError;

/// A world-space ray: origin plus unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

/// Tagged-variant dispatch over the five camera model shapes (spec.md §4.E,
/// §9: "no deep hierarchies"). Each variant is a concrete struct; this enum
/// is the single seam callers interact with.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraModel {
    Cahv(Cahv),
    Cahvor(Cahvor),
    Cahvore(Cahvore),
    Orthographic(Orthographic),
    Gis(GisProjector),
}

impl CameraModel {
    pub fn project(&self, p: DVec3) -> Result<(DVec2, f64), CameraModelError> {
        match self {
            CameraModel::Cahv(c) => c.project(p),
            CameraModel::Cahvor(c) => c.project(p),
            CameraModel::Cahvore(c) => c.project(p),
            CameraModel::Orthographic(c) => c.project(p),
            CameraModel::Gis(c) => c.project(p),
        }
    }

    pub fn unproject(&self, pixel: DVec2) -> Result<Ray, CameraModelError> {
        match self {
            CameraModel::Cahv(c) => c.unproject(pixel),
            CameraModel::Cahvor(c) => c.unproject(pixel),
            CameraModel::Cahvore(c) => c.unproject(pixel),
            CameraModel::Orthographic(c) => c.unproject(pixel),
            CameraModel::Gis(c) => c.unproject(pixel),
        }
    }

    /// Static per-variant fact: true for CAHV and Orthographic.
    pub fn is_linear(&self) -> bool {
        matches!(self, CameraModel::Cahv(_) | CameraModel::Orthographic(_))
    }

    pub fn image_plane_normal(&self) -> Option<DVec3> {
        match self {
            CameraModel::Cahv(c) => Some(c.a),
            CameraModel::Cahvor(c) => Some(c.cahv.a),
            CameraModel::Cahvore(c) => Some(c.cahvor.cahv.a),
            CameraModel::Orthographic(c) => Some(c.forward),
            CameraModel::Gis(_) => None,
        }
    }

    /// Cheap structural sanity check used during ingestion filtering
    /// (`camera_model_invalid`, spec.md §4.J): a non-finite or degenerate
    /// image-plane normal means the model was parsed from garbage metadata.
    pub fn is_valid(&self) -> bool {
        match self.image_plane_normal() {
            Some(n) => n.is_finite() && n.length() > 1e-9,
            None => true,
        }
    }
}
