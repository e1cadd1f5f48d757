use glam::{DVec2, DVec3};

use crate::errors::CameraModelError;

use super::Ray;

/// Affine pixel-to-world orthographic projection: `{center, forward, right,
/// down, width, height}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orthographic {
    pub center: DVec3,
    pub forward: DVec3,
    pub right: DVec3,
    pub down: DVec3,
    pub width: u32,
    pub height: u32,
}

impl Orthographic {
    pub fn project(&self, p: DVec3) -> Result<(DVec2, f64), CameraModelError> {
        let d = p - self.center;
        let range = d.dot(self.forward);
        let x = d.dot(self.right) + self.width as f64 * 0.5;
        let y = d.dot(self.down) + self.height as f64 * 0.5;
        Ok((DVec2::new(x, y), range))
    }

    pub fn unproject(&self, pixel: DVec2) -> Result<Ray, CameraModelError> {
        let x = pixel.x - self.width as f64 * 0.5;
        let y = pixel.y - self.height as f64 * 0.5;
        let origin = self.center + self.right * x + self.down * y;
        Ok(Ray {
            origin,
            direction: self.forward.normalize(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orthographic_round_trip() {
        let cam = Orthographic {
            center: DVec3::ZERO,
            forward: DVec3::new(0.0, 0.0, 1.0),
            right: DVec3::new(1.0, 0.0, 0.0),
            down: DVec3::new(0.0, 1.0, 0.0),
            width: 100,
            height: 100,
        };
        let p = DVec3::new(10.0, -5.0, 20.0);
        let (pixel, _range) = cam.project(p).unwrap();
        let ray = cam.unproject(pixel).unwrap();
        assert!((ray.origin.x - p.x).abs() < 1e-9);
        assert!((ray.origin.y - p.y).abs() < 1e-9);
    }
}
