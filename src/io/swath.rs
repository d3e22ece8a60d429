//! Swath and burst metadata handed over by the product reader, and the
//! burst access trait used by the processing core

use crate::types::{
    BoundingBox, OrbitData, Polarization, SarComplex, SarError, SarImage, SarResult,
    SPEED_OF_LIGHT,
};
use chrono::{DateTime, Utc};
use ndarray::s;
use serde::{Deserialize, Serialize};

/// Polynomial in two-way slant range time: `sum c_k (tau - t0)^k`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangePolynomial {
    pub t0: f64,
    pub coefficients: Vec<f64>,
}

impl RangePolynomial {
    pub fn constant(value: f64) -> Self {
        Self {
            t0: 0.0,
            coefficients: vec![value],
        }
    }

    pub fn eval(&self, tau: f64) -> f64 {
        let dt = tau - self.t0;
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * dt + c)
    }
}

/// TOPS azimuth modulation parameters for one burst
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopsDerampParams {
    /// Azimuth antenna steering rate (rad/s)
    pub azimuth_steering_rate: f64,
    /// Azimuth FM rate (Hz/s) as a function of slant range time
    pub azimuth_fm_rate: RangePolynomial,
    /// Doppler centroid frequency (Hz) as a function of slant range time
    pub doppler_centroid: RangePolynomial,
}

/// Per-burst annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstMetadata {
    /// Relative burst identifier, identical for bursts imaging the same ground
    pub burst_id: u32,
    /// Azimuth time of the first line
    pub azimuth_time: DateTime<Utc>,
    /// Geographic footprint (derived by the metadata collaborator)
    pub footprint: BoundingBox,
    /// First valid sample per line, -1 for an invalid line
    pub first_valid_sample: Vec<i32>,
    /// Last valid sample per line, -1 for an invalid line
    pub last_valid_sample: Vec<i32>,
    pub deramp: TopsDerampParams,
}

impl BurstMetadata {
    /// Valid sample range `[first, last]` for a line, `None` for an invalid line
    /// (including a first valid sample beyond the burst width).
    /// Lines without annotation are considered fully valid.
    pub fn valid_samples_for_line(&self, line: usize, samples: usize) -> Option<(usize, usize)> {
        if samples == 0 {
            return None;
        }
        if line >= self.first_valid_sample.len() || line >= self.last_valid_sample.len() {
            return Some((0, samples - 1));
        }

        let first = self.first_valid_sample[line];
        let last = self.last_valid_sample[line];
        if first < 0 || last < 0 || first > last || first as usize >= samples {
            return None;
        }
        Some((first as usize, (last as usize).min(samples - 1)))
    }
}

/// One subswath/polarization of a Sentinel-1 TOPS SLC product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwathMetadata {
    pub product_id: String,
    /// Subswath name, e.g. "IW1"
    pub swath: String,
    pub polarization: Polarization,
    pub lines_per_burst: usize,
    pub samples_per_burst: usize,
    /// Azimuth line spacing in time (s)
    pub azimuth_time_interval: f64,
    /// Two-way slant range time of the first sample (s)
    pub slant_range_time: f64,
    /// Range sampling rate (Hz)
    pub range_sampling_rate: f64,
    /// Radar wavelength (m)
    pub wavelength: f64,
    pub orbit: OrbitData,
    pub bursts: Vec<BurstMetadata>,
}

impl SwathMetadata {
    pub fn burst_count(&self) -> usize {
        self.bursts.len()
    }

    /// Burst annotation by 1-based index
    pub fn burst(&self, burst_idx: usize) -> SarResult<&BurstMetadata> {
        if burst_idx == 0 || burst_idx > self.bursts.len() {
            return Err(SarError::Configuration(format!(
                "Burst index {} outside 1..={} for {}",
                burst_idx,
                self.bursts.len(),
                self.swath
            )));
        }
        Ok(&self.bursts[burst_idx - 1])
    }

    /// Slant range of the first sample (m)
    pub fn near_range(&self) -> f64 {
        self.slant_range_time * SPEED_OF_LIGHT / 2.0
    }

    /// Slant range sample spacing (m)
    pub fn range_pixel_spacing(&self) -> f64 {
        SPEED_OF_LIGHT / (2.0 * self.range_sampling_rate)
    }

    /// Two-way slant range time of a (fractional) range sample
    pub fn range_time(&self, sample: f64) -> f64 {
        self.slant_range_time + sample / self.range_sampling_rate
    }

    pub fn burst_ids(&self) -> Vec<u32> {
        self.bursts.iter().map(|b| b.burst_id).collect()
    }

    /// Number of lines shared by burst `burst_idx` and the next one (1-based)
    pub fn burst_overlap(&self, burst_idx: usize) -> SarResult<f64> {
        let current = self.burst(burst_idx)?;
        let next = self.burst(burst_idx + 1)?;
        let dt = crate::types::seconds_between(current.azimuth_time, next.azimuth_time);
        Ok(self.lines_per_burst as f64 - dt / self.azimuth_time_interval)
    }

    /// Overlap in lines shared by every pair of consecutive bursts.
    ///
    /// Irregular overlaps are rejected; a single-burst swath has no overlap.
    pub fn uniform_overlap(&self) -> SarResult<usize> {
        if self.bursts.len() < 2 {
            return Ok(0);
        }

        let first = self.burst_overlap(1)?.round();
        for idx in 2..self.bursts.len() {
            let ovl = self.burst_overlap(idx)?.round();
            if ovl != first {
                return Err(SarError::Configuration(format!(
                    "Irregular burst overlap in {}: {} lines between bursts {} and {}, {} lines between bursts 1 and 2",
                    self.swath,
                    ovl,
                    idx,
                    idx + 1,
                    first
                )));
            }
        }

        if first < 0.0 || first as usize >= self.lines_per_burst {
            return Err(SarError::Metadata(format!(
                "Burst overlap of {} lines is inconsistent with {} lines per burst",
                first, self.lines_per_burst
            )));
        }
        Ok(first as usize)
    }
}

/// Access to the bursts of a swath
pub trait BurstSource: Sync {
    fn metadata(&self) -> &SwathMetadata;

    /// Read burst `burst_idx` (1-based). With `mask_invalid`, samples outside
    /// the annotated valid range are set to NaN.
    fn read_burst(&self, burst_idx: usize, mask_invalid: bool) -> SarResult<SarImage>;
}

/// Swath whose bursts are held in memory, stacked along azimuth
pub struct MemorySwath {
    metadata: SwathMetadata,
    data: SarImage,
}

impl MemorySwath {
    pub fn new(metadata: SwathMetadata, data: SarImage) -> SarResult<Self> {
        let expected = (
            metadata.lines_per_burst * metadata.burst_count(),
            metadata.samples_per_burst,
        );
        if data.dim() != expected {
            return Err(SarError::InvalidFormat(format!(
                "Swath raster is {:?}, expected {:?} for {} bursts",
                data.dim(),
                expected,
                metadata.burst_count()
            )));
        }
        Ok(Self { metadata, data })
    }

    pub fn data(&self) -> &SarImage {
        &self.data
    }
}

impl BurstSource for MemorySwath {
    fn metadata(&self) -> &SwathMetadata {
        &self.metadata
    }

    fn read_burst(&self, burst_idx: usize, mask_invalid: bool) -> SarResult<SarImage> {
        let burst = self.metadata.burst(burst_idx)?;
        let lpb = self.metadata.lines_per_burst;
        let start = (burst_idx - 1) * lpb;
        let mut arr = self.data.slice(s![start..start + lpb, ..]).to_owned();

        if mask_invalid {
            let nan = SarComplex::new(f32::NAN, f32::NAN);
            let samples = arr.ncols();
            for (line, mut row) in arr.outer_iter_mut().enumerate() {
                match burst.valid_samples_for_line(line, samples) {
                    Some((first, last)) => {
                        row.slice_mut(s![..first]).fill(nan);
                        row.slice_mut(s![last + 1..]).fill(nan);
                    }
                    None => row.fill(nan),
                }
            }
        }

        Ok(arr)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::StateVector;
    use chrono::TimeZone;

    /// Small swath with a straight northward orbit over the equator
    pub fn synthetic_metadata(lines_per_burst: usize, samples: usize, bursts: usize, overlap: usize) -> SwathMetadata {
        let t_ref = Utc.with_ymd_and_hms(2023, 9, 4, 6, 37, 0).unwrap();
        let dt = 0.002;
        let state_vectors = (0..20)
            .map(|k| StateVector {
                time: t_ref + chrono::Duration::seconds(k),
                position: [6_378_137.0 + 700_000.0, 0.0, 7_500.0 * (k as f64 - 5.0)],
                velocity: [0.0, 0.0, 7_500.0],
            })
            .collect();
        let burst_start = t_ref + chrono::Duration::seconds(5);
        let cycle_us = ((lines_per_burst - overlap) as f64 * dt * 1e6).round() as i64;
        let bursts = (0..bursts)
            .map(|b| BurstMetadata {
                burst_id: 1000 + b as u32,
                azimuth_time: burst_start + chrono::Duration::microseconds(cycle_us * b as i64),
                footprint: BoundingBox { min_lon: 0.0, max_lon: 1.0, min_lat: 0.0, max_lat: 1.0 },
                first_valid_sample: vec![0; lines_per_burst],
                last_valid_sample: vec![samples as i32 - 1; lines_per_burst],
                deramp: TopsDerampParams {
                    azimuth_steering_rate: 0.0275,
                    azimuth_fm_rate: RangePolynomial::constant(-2200.0),
                    doppler_centroid: RangePolynomial::constant(10.0),
                },
            })
            .collect();

        SwathMetadata {
            product_id: "SYNTHETIC".to_string(),
            swath: "IW1".to_string(),
            polarization: Polarization::VV,
            lines_per_burst,
            samples_per_burst: samples,
            azimuth_time_interval: dt,
            slant_range_time: 2.0 * 800_000.0 / SPEED_OF_LIGHT,
            range_sampling_rate: SPEED_OF_LIGHT / (2.0 * 15.0),
            wavelength: 0.055465,
            orbit: OrbitData { state_vectors, reference_time: t_ref },
            bursts,
        }
    }
}
