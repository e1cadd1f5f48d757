use glam::{DVec2, DVec3};

use crate::errors::CameraModelError;

use super::{Cahv, Ray};

const DENOM_EPS: f64 = 1e-15;
const NEWTON_MAX_ITERS: u32 = 20;
const NEWTON_TOL: f64 = 1e-6;

/// Extends [`Cahv`] with radial distortion `{o, r}`; `r` holds the odd-power
/// polynomial coefficients `[k1, k3, k5]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cahvor {
    pub cahv: Cahv,
    pub o: DVec3,
    pub r: [f64; 3],
}

impl Cahvor {
    pub fn new(cahv: Cahv, o: DVec3, r: [f64; 3]) -> Self {
        Self { cahv, o: o.normalize(), r }
    }

    fn decompose(&self, dir: DVec3) -> (f64, DVec3) {
        let zeta = dir.dot(self.o);
        let perp = dir - zeta * self.o;
        (zeta, perp)
    }

    /// `g(tau) = k1 + k3*tau^2 + k5*tau^4`, the radial-distortion scale
    /// applied to the tangent-of-angle `tau` from the optical axis.
    pub(crate) fn distortion_scale(&self, tau: f64) -> f64 {
        let [k1, k3, k5] = self.r;
        k1 + tau * tau * (k3 + tau * tau * k5)
    }

    pub fn project(&self, p: DVec3) -> Result<(DVec2, f64), CameraModelError> {
        let d = p - self.cahv.c;
        let (zeta, perp) = self.decompose(d);
        if zeta.abs() <= DENOM_EPS {
            return Err(CameraModelError::ArithmeticUnderflow);
        }
        let tau = perp.length() / zeta.abs();
        let distorted_perp = perp * self.distortion_scale(tau);
        let pp = zeta * self.o + distorted_perp;

        let denom = pp.dot(self.cahv.a);
        if denom.abs() <= DENOM_EPS {
            return Err(CameraModelError::ArithmeticUnderflow);
        }
        let pixel = DVec2::new(pp.dot(self.cahv.h) / denom, pp.dot(self.cahv.v) / denom);
        let range = d.length() * denom.signum();
        Ok((pixel, range))
    }

    pub fn unproject(&self, pixel: DVec2) -> Result<Ray, CameraModelError> {
        let nominal = self.cahv.unproject(pixel)?;
        let (zeta_d, perp_d) = self.decompose(nominal.direction);
        let tau_d = perp_d.length() / zeta_d.abs();

        if tau_d.abs() < NEWTON_TOL {
            return Ok(nominal);
        }

        // Solve k5*u^5 + k3*u^3 + k1*u = tau_d for the undistorted tangent
        // `u`, seeded at the observed (distorted) value.
        let [k1, k3, k5] = self.r;
        let f = |u: f64| k5 * u.powi(5) + k3 * u.powi(3) + k1 * u - tau_d;
        let fprime = |u: f64| 5.0 * k5 * u.powi(4) + 3.0 * k3 * u.powi(2) + k1;

        let mut u = tau_d;
        for _ in 0..NEWTON_MAX_ITERS {
            let deriv = fprime(u);
            if deriv <= 0.0 {
                return Err(CameraModelError::DistortionNegative);
            }
            let delta = f(u) / deriv;
            u -= delta;
            if delta.abs() < NEWTON_TOL {
                let undistorted_perp = perp_d * (u / tau_d);
                let direction = (zeta_d * self.o + undistorted_perp).normalize();
                return Ok(Ray {
                    origin: self.cahv.c,
                    direction,
                });
            }
        }
        Err(CameraModelError::ConvergenceFailure {
            iters: NEWTON_MAX_ITERS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cahvor_round_trip_small_distortion() {
        let cahv = Cahv::new(
            DVec3::ZERO,
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(100.0, 0.0, 50.0),
            DVec3::new(0.0, 100.0, 50.0),
        );
        let cam = Cahvor::new(cahv, DVec3::new(0.0, 0.0, 1.0), [1.0, 0.001, 0.0001]);
        let p = DVec3::new(1.0, 2.0, 5.0);
        let (pixel, _range) = cam.project(p).unwrap();
        let ray = cam.unproject(pixel).unwrap();
        let t = (p - ray.origin).dot(ray.direction);
        let closest = ray.origin + ray.direction * t;
        assert!((closest - p).length() < 1e-6);
    }
}
