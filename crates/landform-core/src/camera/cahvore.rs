use std::f64::consts::PI;

use glam::{DVec2, DVec3};

use crate::errors::CameraModelError;

use super::{Cahvor, Ray};

const INNER_MAX_ITERS: u32 = 20;
const OUTER_MAX_ITERS: u32 = 100;
const NEWTON_TOL: f64 = 1e-6;
const DENOM_EPS: f64 = 1e-15;

/// Extends [`Cahvor`] with an entrance-pupil offset `e` and a `linearity`
/// parameter selecting perspective (1), fisheye (0), or a general projection
/// in between, after Gennery's generalized camera model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cahvore {
    pub cahvor: Cahvor,
    pub e: DVec3,
    pub linearity: f64,
}

impl Cahvore {
    pub fn new(cahvor: Cahvor, e: DVec3, linearity: f64) -> Self {
        Self { cahvor, e, linearity }
    }

    fn hemisphere_bound(&self) -> f64 {
        if self.linearity.abs() < f64::EPSILON {
            f64::INFINITY
        } else {
            PI / (2.0 * self.linearity.abs())
        }
    }

    /// `tan(linearity * theta) / linearity`, the generalized perspective
    /// mapping; reduces to `theta` as `linearity -> 0` and `tan(theta)` at
    /// `linearity = 1`.
    fn pupil_tau(&self, theta: f64) -> f64 {
        if self.linearity.abs() < f64::EPSILON {
            theta
        } else {
            (self.linearity * theta).tan() / self.linearity
        }
    }

    fn inner_remove_lens_distortion(&self, distorted_tau: f64) -> Result<f64, CameraModelError> {
        let [k1, k3, k5] = self.cahvor.r;
        let f = |u: f64| k5 * u.powi(5) + k3 * u.powi(3) + k1 * u - distorted_tau;
        let fprime = |u: f64| 5.0 * k5 * u.powi(4) + 3.0 * k3 * u.powi(2) + k1;

        let mut u = distorted_tau;
        for _ in 0..INNER_MAX_ITERS {
            let deriv = fprime(u);
            if deriv <= 0.0 {
                return Err(CameraModelError::DistortionNegative);
            }
            let delta = f(u) / deriv;
            u -= delta;
            if delta.abs() < NEWTON_TOL {
                return Ok(u);
            }
        }
        Err(CameraModelError::ConvergenceFailure {
            iters: INNER_MAX_ITERS,
        })
    }

    /// Outer Newton loop solving `pupil_tau(theta) = target` for `theta`.
    fn outer_solve_theta(&self, target_pupil_tau: f64) -> Result<f64, CameraModelError> {
        let bound = self.hemisphere_bound();
        let mut theta = target_pupil_tau.atan();
        for _ in 0..OUTER_MAX_ITERS {
            if theta.abs() > bound {
                return Err(CameraModelError::OutOfHemisphere);
            }
            let g = self.pupil_tau(theta) - target_pupil_tau;
            let h = 1e-6;
            let gprime = (self.pupil_tau(theta + h) - self.pupil_tau(theta - h)) / (2.0 * h);
            if gprime.abs() <= DENOM_EPS {
                return Err(CameraModelError::DistortionNegative);
            }
            let delta = g / gprime;
            theta -= delta;
            if delta.abs() < NEWTON_TOL {
                if theta.abs() > bound {
                    return Err(CameraModelError::OutOfHemisphere);
                }
                return Ok(theta);
            }
        }
        Err(CameraModelError::ConvergenceFailure {
            iters: OUTER_MAX_ITERS,
        })
    }

    pub fn project(&self, p: DVec3) -> Result<(DVec2, f64), CameraModelError> {
        let cahv = &self.cahvor.cahv;
        let o = self.cahvor.o;

        let d0 = p - cahv.c;
        let zeta0 = d0.dot(o);
        let perp0 = d0 - zeta0 * o;
        if perp0.length() + zeta0.abs() <= DENOM_EPS {
            return Err(CameraModelError::ArithmeticUnderflow);
        }
        let theta = perp0.length().atan2(zeta0);

        let c_eff = cahv.c + self.e * theta.sin();
        let d = p - c_eff;
        let zeta = d.dot(o);
        let perp = d - zeta * o;
        if zeta.abs() <= DENOM_EPS {
            return Err(CameraModelError::ArithmeticUnderflow);
        }
        let perp_hat = if perp.length() > DENOM_EPS {
            perp.normalize()
        } else {
            DVec3::ZERO
        };

        let pupil_tau = self.pupil_tau(theta);
        let distorted_tau = pupil_tau * self.cahvor.distortion_scale(pupil_tau);
        let pp = zeta * o + perp_hat * distorted_tau * zeta.abs();

        let denom = pp.dot(cahv.a);
        if denom.abs() <= DENOM_EPS {
            return Err(CameraModelError::ArithmeticUnderflow);
        }
        let pixel = DVec2::new(pp.dot(cahv.h) / denom, pp.dot(cahv.v) / denom);
        let range = d.length() * denom.signum();
        Ok((pixel, range))
    }

    pub fn unproject(&self, pixel: DVec2) -> Result<Ray, CameraModelError> {
        let cahv = &self.cahvor.cahv;
        let o = self.cahvor.o;

        let nominal = cahv.unproject(pixel)?;
        let zeta_d = nominal.direction.dot(o);
        let perp_d = nominal.direction - zeta_d * o;
        let distorted_tau = perp_d.length() / zeta_d.abs().max(DENOM_EPS);

        let pupil_tau = self.inner_remove_lens_distortion(distorted_tau)?;
        let theta = self.outer_solve_theta(pupil_tau)?;

        let perp_hat = if perp_d.length() > DENOM_EPS {
            perp_d.normalize()
        } else {
            DVec3::ZERO
        };
        let direction = (o * zeta_d.signum() * theta.cos() + perp_hat * theta.sin()).normalize();
        let origin = cahv.c + self.e * theta.sin();

        Ok(Ray { origin, direction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Cahv;

    #[test]
    fn perspective_limit_round_trips() {
        let cahv = Cahv::new(
            DVec3::ZERO,
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(100.0, 0.0, 50.0),
            DVec3::new(0.0, 100.0, 50.0),
        );
        let cahvor = Cahvor::new(cahv, DVec3::new(0.0, 0.0, 1.0), [1.0, 0.0, 0.0]);
        let cam = Cahvore::new(cahvor, DVec3::ZERO, 1.0);
        let p = DVec3::new(1.0, 2.0, 5.0);
        let (pixel, _r) = cam.project(p).unwrap();
        let ray = cam.unproject(pixel).unwrap();
        let t = (p - ray.origin).dot(ray.direction);
        let closest = ray.origin + ray.direction * t;
        assert!((closest - p).length() < 1e-4);
    }
}
