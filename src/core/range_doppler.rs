//! Zero-Doppler (range-Doppler) inversion and forward projection
//!
//! For a ground point `X` and an orbit `p(t)`, `v(t)`, the azimuth time of
//! observation is the root of the Doppler term
//!
//! ```text
//! f(t) = v(t) . (p(t) - X) = 0
//! ```
//!
//! and the slant range is `|p(t) - X|` at that time.

use crate::core::geometry::{self, Vec3};
use crate::core::orbit::OrbitInterpolator;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Numerical parameters of the zero-Doppler root finder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParams {
    /// Convergence tolerance on the time update (seconds)
    pub time_tolerance: f64,
    /// Maximum Newton iterations
    pub max_iterations: usize,
    /// Step used for the central-difference derivative (seconds)
    pub derivative_step: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            time_tolerance: 1e-9,
            max_iterations: 30,
            derivative_step: 1e-3,
        }
    }
}

/// Zero-Doppler solution for one ground point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroDopplerSolution {
    /// Azimuth time in seconds since the orbit reference time
    pub azimuth_time: f64,
    /// Slant range in meters
    pub slant_range: f64,
}

impl ZeroDopplerSolution {
    pub const INVALID: Self = Self {
        azimuth_time: f64::NAN,
        slant_range: f64::NAN,
    };

    pub fn is_valid(&self) -> bool {
        self.azimuth_time.is_finite() && self.slant_range.is_finite()
    }
}

/// Range-Doppler solver over an interpolated orbit
pub struct RangeDopplerSolver<'a> {
    orbit: &'a OrbitInterpolator,
    params: SolverParams,
}

impl<'a> RangeDopplerSolver<'a> {
    pub fn new(orbit: &'a OrbitInterpolator) -> Self {
        Self::with_params(orbit, SolverParams::default())
    }

    pub fn with_params(orbit: &'a OrbitInterpolator, params: SolverParams) -> Self {
        Self { orbit, params }
    }

    pub fn orbit(&self) -> &OrbitInterpolator {
        self.orbit
    }

    /// Doppler term `v(t) . (p(t) - X)` (proportional to the Doppler frequency)
    pub fn doppler(&self, t: f64, target: &Vec3) -> f64 {
        let (p, v) = self.orbit.state(t);
        geometry::dot(&v, &geometry::sub(&p, target))
    }

    /// Starting time: the state vector with the smallest Doppler magnitude
    fn initial_guess(&self, target: &Vec3) -> f64 {
        let mut best_time = f64::NAN;
        let mut best_abs = f64::INFINITY;
        for (t, p, v) in self.orbit.samples() {
            let f = geometry::dot(v, &geometry::sub(p, target)).abs();
            if f < best_abs {
                best_abs = f;
                best_time = t;
            }
        }
        best_time
    }

    /// Solve the zero-Doppler condition for a single Earth-fixed point.
    ///
    /// Returns [`ZeroDopplerSolution::INVALID`] when the derivative vanishes
    /// (degenerate velocity) or the iteration does not converge.
    pub fn solve(&self, target: &Vec3) -> ZeroDopplerSolution {
        if !target.iter().all(|x| x.is_finite()) {
            return ZeroDopplerSolution::INVALID;
        }

        let h = self.params.derivative_step;
        let mut t = self.initial_guess(target);
        if !t.is_finite() {
            return ZeroDopplerSolution::INVALID;
        }

        for _ in 0..self.params.max_iterations {
            let f = self.doppler(t, target);
            let df = (self.doppler(t + h, target) - self.doppler(t - h, target)) / (2.0 * h);

            if !df.is_finite() || df.abs() < 1e-12 {
                return ZeroDopplerSolution::INVALID;
            }

            let step = f / df;
            t -= step;

            if step.abs() < self.params.time_tolerance {
                let p = self.orbit.position(t);
                return ZeroDopplerSolution {
                    azimuth_time: t,
                    slant_range: geometry::norm(&geometry::sub(&p, target)),
                };
            }
        }

        log::debug!(
            "Zero-Doppler iteration did not converge after {} iterations",
            self.params.max_iterations
        );
        ZeroDopplerSolution::INVALID
    }

    /// Solve for a batch of points in parallel
    pub fn solve_batch(&self, targets: &[Vec3]) -> Vec<ZeroDopplerSolution> {
        targets.par_iter().map(|x| self.solve(x)).collect()
    }

    /// Ground point seen at azimuth time `t` and slant range `slant_range`,
    /// lying at ellipsoidal height `height`, on the right-looking side.
    ///
    /// The point is searched on the zero-Doppler plane through the platform
    /// by bisection on the off-nadir angle. Returns `None` when the range
    /// sphere does not reach the requested height.
    pub fn forward_project(&self, t: f64, slant_range: f64, height: f64) -> Option<Vec3> {
        let (p, v) = self.orbit.state(t);
        let v_hat = geometry::normalize(&v)?;
        let up = geometry::normalize(&p)?;
        let up_perp = geometry::sub(&up, &geometry::scale(&v_hat, geometry::dot(&up, &v_hat)));
        let up_perp = geometry::normalize(&up_perp)?;
        let down = geometry::scale(&up_perp, -1.0);
        let right = geometry::cross(&v_hat, &up_perp);

        let point_at = |theta: f64| -> Vec3 {
            let dir = geometry::add(
                &geometry::scale(&down, theta.cos()),
                &geometry::scale(&right, theta.sin()),
            );
            geometry::add(&p, &geometry::scale(&dir, slant_range))
        };
        let height_error = |theta: f64| geometry::ecef_to_geodetic(&point_at(theta)).2 - height;

        let mut lo = 0.0_f64;
        let mut hi = std::f64::consts::FRAC_PI_2;
        let (f_lo, f_hi) = (height_error(lo), height_error(hi));
        if !(f_lo <= 0.0 && f_hi >= 0.0) {
            return None;
        }

        for _ in 0..80 {
            let mid = 0.5 * (lo + hi);
            if height_error(mid) < 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < 1e-13 {
                break;
            }
        }

        Some(point_at(0.5 * (lo + hi)))
    }
}
