use glam::{DVec2, DVec3};

use crate::errors::CameraModelError;

use super::Ray;

const DENOM_EPS: f64 = 1e-15;
const CROSS_EPS: f64 = 1e-12;

/// Linear pinhole camera model. `a` is the image-plane normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cahv {
    pub c: DVec3,
    pub a: DVec3,
    pub h: DVec3,
    pub v: DVec3,
}

impl Cahv {
    pub fn new(c: DVec3, a: DVec3, h: DVec3, v: DVec3) -> Self {
        Self { c, a, h, v }
    }

    pub fn project(&self, p: DVec3) -> Result<(DVec2, f64), CameraModelError> {
        let d = p - self.c;
        let denom = d.dot(self.a);
        if denom.abs() <= DENOM_EPS {
            return Err(CameraModelError::ArithmeticUnderflow);
        }
        let pixel = DVec2::new(d.dot(self.h) / denom, d.dot(self.v) / denom);
        let range = d.length() * denom.signum();
        Ok((pixel, range))
    }

    pub fn unproject(&self, pixel: DVec2) -> Result<Ray, CameraModelError> {
        let f = self.v - pixel.y * self.a;
        let g = self.h - pixel.x * self.a;
        let n = f.cross(g);
        if n.length() < CROSS_EPS {
            return Err(CameraModelError::DegenerateDirection);
        }
        let orientation = (self.v.cross(self.h)).dot(self.a).signum();
        let mut direction = n.normalize();
        if direction.dot(self.a) * orientation < 0.0 {
            direction = -direction;
        }
        Ok(Ray {
            origin: self.c,
            direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_cahv_round_trip() {
        let cam = Cahv::new(
            DVec3::ZERO,
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(100.0, 0.0, 50.0),
            DVec3::new(0.0, 100.0, 50.0),
        );
        let p = DVec3::new(1.0, 2.0, 5.0);
        let (pixel, range) = cam.project(p).unwrap();
        assert!((pixel.x - 70.0).abs() < 1e-9);
        assert!((pixel.y - 90.0).abs() < 1e-9);
        assert!((range - 5.477225575).abs() < 1e-6);

        let ray = cam.unproject(pixel).unwrap();
        // The ray from the camera origin should pass through p.
        let t = (p - ray.origin).dot(ray.direction);
        let closest = ray.origin + ray.direction * t;
        assert!((closest - p).length() < 1e-9);
    }
}
