use glam::{DVec2, DVec3};

use crate::errors::CameraModelError;

use super::Ray;

/// The GIS coordinate machinery itself (raster -> easting/northing ->
/// lon/lat -> body-frame XYZ) is an external collaborator (spec.md §1); this
/// crate only needs the narrow seam a raster-to-world projector provides.
pub trait Projector: std::fmt::Debug {
    fn raster_to_body_frame(&self, pixel: DVec2) -> DVec3;
    fn body_frame_to_raster(&self, p: DVec3) -> DVec2;
}

#[derive(Debug, Clone)]
struct AffineProjector {
    geo_transform: [f64; 6],
}

impl Projector for AffineProjector {
    fn raster_to_body_frame(&self, pixel: DVec2) -> DVec3 {
        let gt = self.geo_transform;
        let easting = gt[0] + pixel.x * gt[1] + pixel.y * gt[2];
        let northing = gt[3] + pixel.x * gt[4] + pixel.y * gt[5];
        DVec3::new(easting, northing, 0.0)
    }

    fn body_frame_to_raster(&self, p: DVec3) -> DVec2 {
        let gt = self.geo_transform;
        // GT[2] and GT[4] (skew) are rejected at ingestion (spec.md §6), so
        // this affine is always axis-aligned and invertible in closed form.
        let x = (p.x - gt[0]) / gt[1];
        let y = (p.y - gt[3]) / gt[5];
        DVec2::new(x, y)
    }
}

/// Raster-to-(easting,northing)-to-(lon,lat)-to-body-frame-XYZ camera model,
/// delegating the actual projection math to an external [`Projector`].
#[derive(Debug, Clone)]
pub struct GisProjector {
    projector: std::sync::Arc<dyn Projector>,
}

impl PartialEq for GisProjector {
    fn eq(&self, other: &Self) -> bool {
        std::sync::Arc::ptr_eq(&self.projector, &other.projector)
    }
}

impl GisProjector {
    pub fn from_geo_transform(geo_transform: [f64; 6]) -> Self {
        Self {
            projector: std::sync::Arc::new(AffineProjector { geo_transform }),
        }
    }

    pub fn new(projector: std::sync::Arc<dyn Projector>) -> Self {
        Self { projector }
    }

    pub fn project(&self, p: DVec3) -> Result<(DVec2, f64), CameraModelError> {
        Ok((self.projector.body_frame_to_raster(p), p.z))
    }

    pub fn unproject(&self, pixel: DVec2) -> Result<Ray, CameraModelError> {
        let origin = self.projector.raster_to_body_frame(pixel);
        Ok(Ray {
            origin,
            direction: DVec3::new(0.0, 0.0, -1.0),
        })
    }
}
