use crate::core::geometry::Vec3;
use crate::types::{OrbitData, SarError, SarResult};
use chrono::{DateTime, Utc};

/// Default number of state vectors used by the Lagrange interpolator
pub const DEFAULT_LAGRANGE_POINTS: usize = 4;

/// Continuous orbit model built from discrete state vectors.
///
/// Position and velocity are interpolated independently with Lagrange
/// polynomials over the `order` state vectors nearest to the requested time.
/// Outside the sampled span the first (or last) window is evaluated as is,
/// which extrapolates smoothly instead of failing.
#[derive(Debug, Clone)]
pub struct OrbitInterpolator {
    reference_time: DateTime<Utc>,
    /// State vector times in seconds since `reference_time`
    times: Vec<f64>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    order: usize,
}

impl OrbitInterpolator {
    /// Build the interpolator from orbit data using `order` points per window
    pub fn new(orbit: &OrbitData, order: usize) -> SarResult<Self> {
        let times = orbit
            .state_vectors
            .iter()
            .map(|sv| orbit.seconds_since_reference(sv.time))
            .collect();
        let positions = orbit.state_vectors.iter().map(|sv| sv.position).collect();
        let velocities = orbit.state_vectors.iter().map(|sv| sv.velocity).collect();
        Self::from_samples(orbit.reference_time, times, positions, velocities, order)
    }

    /// Build the interpolator from raw samples (times in seconds since `reference_time`)
    pub fn from_samples(
        reference_time: DateTime<Utc>,
        times: Vec<f64>,
        positions: Vec<Vec3>,
        velocities: Vec<Vec3>,
        order: usize,
    ) -> SarResult<Self> {
        if times.is_empty() {
            return Err(SarError::Metadata("No state vectors in orbit data".to_string()));
        }
        if times.len() != positions.len() || times.len() != velocities.len() {
            return Err(SarError::Metadata(format!(
                "Inconsistent orbit samples: {} times, {} positions, {} velocities",
                times.len(),
                positions.len(),
                velocities.len()
            )));
        }
        if times.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(SarError::Metadata(
                "State vector times must be strictly increasing".to_string(),
            ));
        }
        if order == 0 {
            return Err(SarError::Configuration(
                "Orbit interpolation order must be positive".to_string(),
            ));
        }
        if times.len() < order {
            log::warn!(
                "Only {} state vectors available for {}-point orbit interpolation",
                times.len(),
                order
            );
        }

        Ok(Self {
            reference_time,
            times,
            positions,
            velocities,
            order,
        })
    }

    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    /// Seconds since the reference time for an absolute time
    pub fn time_of(&self, time: DateTime<Utc>) -> f64 {
        crate::types::seconds_between(self.reference_time, time)
    }

    /// First and last state vector times (seconds)
    pub fn time_span(&self) -> (f64, f64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Raw samples as (time, position, velocity)
    pub fn samples(&self) -> impl Iterator<Item = (f64, &Vec3, &Vec3)> + '_ {
        self.times
            .iter()
            .zip(self.positions.iter().zip(self.velocities.iter()))
            .map(|(&t, (p, v))| (t, p, v))
    }

    /// Index range of the state vectors used around time `t`
    fn window(&self, t: f64) -> std::ops::Range<usize> {
        let n = self.times.len();
        let m = self.order.min(n);
        let idx = self.times.partition_point(|&ti| ti < t);
        let start = idx.saturating_sub(m / 2).min(n - m);
        start..start + m
    }

    fn lagrange(&self, samples: &[Vec3], t: f64) -> Vec3 {
        let window = self.window(t);
        let mut result = [0.0; 3];
        for i in window.clone() {
            let ti = self.times[i];
            let mut li = 1.0;
            for j in window.clone() {
                if i != j {
                    let tj = self.times[j];
                    li *= (t - tj) / (ti - tj);
                }
            }
            for coord in 0..3 {
                result[coord] += li * samples[i][coord];
            }
        }
        result
    }

    /// Interpolated position at time `t` (seconds)
    pub fn position(&self, t: f64) -> Vec3 {
        self.lagrange(&self.positions, t)
    }

    /// Interpolated velocity at time `t` (seconds)
    pub fn velocity(&self, t: f64) -> Vec3 {
        self.lagrange(&self.velocities, t)
    }

    /// Position and velocity at time `t`
    pub fn state(&self, t: f64) -> (Vec3, Vec3) {
        (self.position(t), self.velocity(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StateVector;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn circular_orbit() -> OrbitData {
        let t0 = Utc.with_ymd_and_hms(2023, 9, 4, 6, 37, 20).unwrap();
        let radius = 7_071_000.0;
        let omega = 7_500.0 / radius;
        let state_vectors = (0..12)
            .map(|k| {
                let t = 10.0 * k as f64;
                let a = omega * t;
                StateVector {
                    time: t0 + chrono::Duration::seconds(10 * k),
                    position: [radius * a.cos(), 0.0, radius * a.sin()],
                    velocity: [-radius * omega * a.sin(), 0.0, radius * omega * a.cos()],
                }
            })
            .collect();
        OrbitData {
            state_vectors,
            reference_time: t0,
        }
    }

    #[test]
    fn test_interpolation_hits_samples() {
        let orbit = circular_orbit();
        let interp = OrbitInterpolator::new(&orbit, DEFAULT_LAGRANGE_POINTS).unwrap();
        for sv in &orbit.state_vectors {
            let t = interp.time_of(sv.time);
            let p = interp.position(t);
            for c in 0..3 {
                assert_abs_diff_eq!(p[c], sv.position[c], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_interpolation_between_samples() {
        let orbit = circular_orbit();
        let interp = OrbitInterpolator::new(&orbit, 6).unwrap();
        let radius = 7_071_000.0;
        let omega = 7_500.0 / radius;
        let t = 43.7;
        let p = interp.position(t);
        assert_abs_diff_eq!(p[0], radius * (omega * t).cos(), epsilon = 1e-3);
        assert_abs_diff_eq!(p[2], radius * (omega * t).sin(), epsilon = 1e-3);
    }

    #[test]
    fn test_extrapolation_is_finite() {
        let interp = OrbitInterpolator::new(&circular_orbit(), DEFAULT_LAGRANGE_POINTS).unwrap();
        let p = interp.position(-5.0);
        let v = interp.velocity(125.0);
        assert!(p.iter().all(|x| x.is_finite()));
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_rejects_unsorted_times() {
        let mut orbit = circular_orbit();
        orbit.state_vectors.swap(2, 3);
        assert!(OrbitInterpolator::new(&orbit, 4).is_err());
    }
}
