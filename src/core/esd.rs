//! Fast Enhanced Spectral Diversity: removal of interferometric phase jumps
//! between consecutive bursts.
//!
//! The jump at each seam is estimated from the cross interferogram of the
//! overlap lines, then every secondary burst receives a linear azimuth phase
//! ramp that splits the jumps of its two seams.

use crate::core::burst_processor::BurstAccumulator;
use crate::types::{SarComplex, SarError, SarResult};
use ndarray::{Array1, Zip};
use num_complex::Complex;

/// Phase jump at the seam following burst `burst_idx`, `None` when the overlap
/// holds no valid sample
fn seam_phase_difference(
    primary: &BurstAccumulator,
    secondary: &BurstAccumulator,
    burst_idx: usize,
    overlap: usize,
) -> SarResult<Option<f64>> {
    let lines = primary.lines_per_burst();
    let tail_p = primary.lines(burst_idx, lines - overlap, overlap)?;
    let tail_s = secondary.lines(burst_idx, lines - overlap, overlap)?;
    let head_p = primary.lines(burst_idx + 1, 0, overlap)?;
    let head_s = secondary.lines(burst_idx + 1, 0, overlap)?;

    let mut sum = Complex::<f64>::new(0.0, 0.0);
    let mut count = 0usize;
    Zip::from(&tail_p)
        .and(&tail_s)
        .and(&head_p)
        .and(&head_s)
        .for_each(|tp, ts, hp, hs| {
            let ifg_tail = tp * ts.conj();
            let ifg_head = hp * hs.conj();
            let cross = ifg_tail * ifg_head.conj();
            if !(cross.re.is_nan() || cross.im.is_nan()) {
                sum += Complex::new(cross.re as f64, cross.im as f64);
                count += 1;
            }
        });

    if count == 0 {
        return Ok(None);
    }
    Ok(Some((sum / count as f64).arg()))
}

/// Estimate the phase jump of every seam of the accumulated bursts.
/// Seams without valid overlap are reported as `None`.
pub fn estimate_seam_phases(
    primary: &BurstAccumulator,
    secondary: &BurstAccumulator,
    overlap: usize,
) -> SarResult<Vec<Option<f64>>> {
    if primary.burst_count() != secondary.burst_count() || primary.first_burst() != secondary.first_burst() {
        return Err(SarError::Configuration(
            "Primary and secondary accumulators cover different bursts".to_string(),
        ));
    }
    let seams = primary.burst_count().saturating_sub(1);
    if overlap == 0 {
        log::warn!("Bursts do not overlap, {} seams left uncorrected", seams);
        return Ok(vec![None; seams]);
    }
    if overlap > primary.lines_per_burst() {
        return Err(SarError::Configuration(format!(
            "Burst overlap of {} lines is unusable with {} lines per burst",
            overlap,
            primary.lines_per_burst()
        )));
    }

    log::info!("Fast ESD: computing cross interferograms");
    (primary.first_burst()..primary.last_burst())
        .map(|b| {
            let estimate = seam_phase_difference(primary, secondary, b, overlap)?;
            match estimate {
                Some(dphi) => log::debug!("Seam {}/{}: phase jump {:.4} rad", b, b + 1, dphi),
                None => log::warn!(
                    "No valid samples in the overlap of bursts {} and {}, seam left uncorrected",
                    b,
                    b + 1
                ),
            }
            Ok(estimate)
        })
        .collect()
}

/// Linear azimuth phase ramp for burst position `idx` (0-based) among
/// `phase_diffs.len() + 1` bursts, pivoting at the overlap centres.
pub fn esd_ramp(phase_diffs: &[f64], idx: usize, lines_per_burst: usize, overlap: usize) -> Array1<f64> {
    let n = phase_diffs.len();
    let (y_down, y_up) = if n == 0 {
        (0.0, 0.0)
    } else if idx == 0 {
        (-phase_diffs[0] / 2.0, phase_diffs[0] / 2.0)
    } else if idx >= n {
        (-phase_diffs[n - 1] / 2.0, phase_diffs[n - 1] / 2.0)
    } else {
        (-phase_diffs[idx - 1] / 2.0, phase_diffs[idx] / 2.0)
    };

    let x_down = overlap as f64 / 2.0;
    let x_up = lines_per_burst as f64 - 1.0 - overlap as f64 / 2.0;
    let slope = if x_up > x_down { (y_up - y_down) / (x_up - x_down) } else { 0.0 };
    let offset = y_down - slope * x_down;

    Array1::from_shape_fn(lines_per_burst, |line| slope * line as f64 + offset)
}

/// Estimate seam phase jumps and apply the compensating ramps in place to
/// the secondary accumulator. Returns the per-seam estimates.
pub fn apply_fast_esd(
    primary: &BurstAccumulator,
    secondary: &mut BurstAccumulator,
    overlap: usize,
) -> SarResult<Vec<Option<f64>>> {
    if primary.burst_count() < 2 {
        log::debug!("Fast ESD skipped for a single burst");
        return Ok(Vec::new());
    }
    let estimates = estimate_seam_phases(primary, secondary, overlap)?;
    let phase_diffs: Vec<f64> = estimates.iter().map(|e| e.unwrap_or(0.0)).collect();

    log::info!("Fast ESD: applying phase corrections");
    let lines = secondary.lines_per_burst();
    for (idx, b) in (secondary.first_burst()..=secondary.last_burst()).enumerate() {
        let ramp = esd_ramp(&phase_diffs, idx, lines, overlap);
        let mut window = secondary.window_mut(b)?;
        for (mut row, &phi) in window.outer_iter_mut().zip(ramp.iter()) {
            let rot = SarComplex::from_polar(1.0, phi as f32);
            row.mapv_inplace(|v| v * rot);
        }
    }

    Ok(estimates)
}
