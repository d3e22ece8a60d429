//! TOPS burst phase models: azimuth deramping and range-dependent
//! topographic phase
//!
//! Deramping follows the ESA definition of the TOPS SLC deramping function:
//!
//! ```text
//! ks      = 2 v / lambda * k_psi
//! kt(tau) = ka(tau) ks / (ka(tau) - ks)
//! eta_ref = eta_c(tau) - eta_c(tau_mid),   eta_c = -fdc(tau) / ka(tau)
//! phi     = -pi kt (eta - eta_ref)^2 - 2 pi fdc (eta - eta_ref)
//! ```

use crate::core::geometry;
use crate::core::orbit::OrbitInterpolator;
use crate::io::swath::SwathMetadata;
use crate::types::{SarError, SarResult};
use ndarray::{Array1, Array2, Zip};
use std::f64::consts::PI;

/// Deramping phase (radians) of burst `burst_idx`, shaped like the burst.
///
/// Multiplying the burst by `exp(i * phase)` removes the azimuth-varying
/// Doppler modulation; multiplying by `exp(-i * phase)` restores it.
pub fn deramp_phase(
    meta: &SwathMetadata,
    orbit: &OrbitInterpolator,
    burst_idx: usize,
) -> SarResult<Array2<f64>> {
    let burst = meta.burst(burst_idx)?;
    let lines = meta.lines_per_burst;
    let samples = meta.samples_per_burst;
    let dt = meta.azimuth_time_interval;

    // platform speed at mid-burst
    let t_start = orbit.time_of(burst.azimuth_time);
    let t_mid = t_start + 0.5 * lines as f64 * dt;
    let speed = geometry::norm(&orbit.velocity(t_mid));
    if !speed.is_finite() || speed == 0.0 {
        return Err(SarError::Processing(format!(
            "Degenerate platform velocity at burst {} mid time",
            burst_idx
        )));
    }

    let params = &burst.deramp;
    let ks = 2.0 * speed / meta.wavelength * params.azimuth_steering_rate;

    let tau_mid = meta.range_time(0.5 * samples as f64);
    let eta_c = |tau: f64| -params.doppler_centroid.eval(tau) / params.azimuth_fm_rate.eval(tau);
    let eta_c_mid = eta_c(tau_mid);

    // range-dependent terms
    let mut kt = Array1::<f64>::zeros(samples);
    let mut fdc = Array1::<f64>::zeros(samples);
    let mut eta_ref = Array1::<f64>::zeros(samples);
    for s in 0..samples {
        let tau = meta.range_time(s as f64);
        let ka = params.azimuth_fm_rate.eval(tau);
        kt[s] = ka * ks / (ka - ks);
        fdc[s] = params.doppler_centroid.eval(tau);
        eta_ref[s] = eta_c(tau) - eta_c_mid;
    }
    if kt.iter().any(|v| !v.is_finite()) {
        log::warn!(
            "Non-finite Doppler centroid rate in burst {}, deramping phase will contain NaN",
            burst_idx
        );
    }

    let half = lines as f64 / 2.0;
    let mut phase = Array2::<f64>::zeros((lines, samples));
    Zip::indexed(&mut phase).par_for_each(|(line, s), value| {
        let eta = (line as f64 - half) * dt - eta_ref[s];
        *value = -PI * kt[s] * eta * eta - 2.0 * PI * fdc[s] * eta;
    });

    Ok(phase)
}

/// Range-dependent two-way propagation phase `4 pi R / lambda` of a swath
#[derive(Debug, Clone, PartialEq)]
pub struct RangePhaseModel {
    pub near_range: f64,
    pub range_pixel_spacing: f64,
    pub wavelength: f64,
}

impl RangePhaseModel {
    pub fn from_metadata(meta: &SwathMetadata) -> Self {
        Self {
            near_range: meta.near_range(),
            range_pixel_spacing: meta.range_pixel_spacing(),
            wavelength: meta.wavelength,
        }
    }

    /// Phase at (fractional) range sample `rg`
    pub fn phase(&self, rg: f64) -> f64 {
        4.0 * PI * (self.near_range + rg * self.range_pixel_spacing) / self.wavelength
    }

    /// Difference `phase(rg_p) - other.phase(rg_s)`, evaluated so that the
    /// large common near-range term cancels before scaling.
    pub fn phase_difference(&self, rg_p: f64, other: &RangePhaseModel, rg_s: f64) -> f64 {
        if self.wavelength == other.wavelength {
            let dr = (self.near_range - other.near_range)
                + rg_p * self.range_pixel_spacing
                - rg_s * other.range_pixel_spacing;
            4.0 * PI * dr / self.wavelength
        } else {
            self.phase(rg_p) - other.phase(rg_s)
        }
    }
}

/// Topographic phase `phi_p(col) - phi_s(rg_s2p)` for every primary pixel.
/// NaN secondary coordinates give NaN.
pub fn topographic_phase(
    primary: &RangePhaseModel,
    secondary: &RangePhaseModel,
    rg_s2p: &Array2<f64>,
) -> Array2<f64> {
    let mut phase = Array2::<f64>::zeros(rg_s2p.dim());
    Zip::indexed(&mut phase)
        .and(rg_s2p)
        .par_for_each(|(_, col), value, &rg_s| {
            *value = primary.phase_difference(col as f64, secondary, rg_s);
        });
    phase
}
