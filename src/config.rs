//! Processing configuration, loadable from JSON

use crate::core::burst_processor::BurstProcessingParams;
use crate::core::lut_merge::DEFAULT_MERGE_OFFSET;
use crate::core::orbit::DEFAULT_LAGRANGE_POINTS;
use crate::core::range_doppler::SolverParams;
use crate::core::resample::{ComplexInterpolation, Kernel, Resampler};
use crate::types::{SarError, SarResult};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

/// Settings of the subswath InSAR pre-processing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsarConfig {
    /// First burst to process (1-based)
    pub min_burst: usize,
    /// Last burst to process, the last burst of the swath when unset
    pub max_burst: Option<usize>,
    /// Correct phase jumps between bursts (needs at least two bursts)
    pub apply_fast_esd: bool,
    /// Kernel used to warp the secondary bursts
    pub warp_kernel: Kernel,
    pub complex_interpolation: ComplexInterpolation,
    /// DEM upsampling factor applied before geocoding
    pub dem_upsampling: f64,
    /// Buffer around burst footprints when fetching the DEM (arc seconds)
    pub dem_buffer_arc_sec: f64,
    pub dem_force_download: bool,
    pub orbit_interpolation_points: usize,
    pub solver: SolverParams,
    /// Lines of margin kept around each burst's LUT before merging
    pub lut_merge_offset: usize,
    pub parallel_bursts: bool,
}

impl Default for InsarConfig {
    fn default() -> Self {
        Self {
            min_burst: 1,
            max_burst: None,
            apply_fast_esd: true,
            warp_kernel: Kernel::Bicubic,
            complex_interpolation: ComplexInterpolation::Cartesian,
            dem_upsampling: 1.8,
            dem_buffer_arc_sec: 40.0,
            dem_force_download: false,
            orbit_interpolation_points: DEFAULT_LAGRANGE_POINTS,
            solver: SolverParams::default(),
            lut_merge_offset: DEFAULT_MERGE_OFFSET,
            parallel_bursts: false,
        }
    }
}

impl InsarConfig {
    pub fn from_json_str(json: &str) -> SarResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SarResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loading InSAR configuration from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    pub fn to_json(&self) -> SarResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the settings that do not depend on the input products
    pub fn validate(&self) -> SarResult<()> {
        if self.min_burst == 0 {
            return Err(SarError::Configuration("min_burst is 1-based".to_string()));
        }
        if let Some(max) = self.max_burst {
            if max < self.min_burst {
                return Err(SarError::Configuration(format!(
                    "max_burst ({}) must be >= min_burst ({})",
                    max, self.min_burst
                )));
            }
        }
        if !(self.dem_upsampling > 0.0) || !self.dem_upsampling.is_finite() {
            return Err(SarError::Configuration(format!(
                "dem_upsampling must be positive, got {}",
                self.dem_upsampling
            )));
        }
        if !(self.dem_buffer_arc_sec >= 0.0) {
            return Err(SarError::Configuration(format!(
                "dem_buffer_arc_sec must be non-negative, got {}",
                self.dem_buffer_arc_sec
            )));
        }
        if self.orbit_interpolation_points == 0 {
            return Err(SarError::Configuration(
                "orbit_interpolation_points must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Bursts to process for a swath of `burst_count` bursts
    pub fn burst_range(&self, burst_count: usize) -> SarResult<RangeInclusive<usize>> {
        let max_burst = self.max_burst.unwrap_or(burst_count);
        if max_burst < self.min_burst {
            return Err(SarError::Configuration(format!(
                "max_burst ({}) must be >= min_burst ({})",
                max_burst, self.min_burst
            )));
        }
        if self.min_burst < 1 || max_burst > burst_count {
            return Err(SarError::Configuration(format!(
                "min_burst and max_burst must be values between 1 and {}",
                burst_count
            )));
        }
        Ok(self.min_burst..=max_burst)
    }

    pub fn processing_params(&self) -> BurstProcessingParams {
        BurstProcessingParams {
            resampler: Resampler::new(self.warp_kernel).with_complex_interpolation(self.complex_interpolation),
            dem_upsampling: self.dem_upsampling,
            dem_buffer_arc_sec: self.dem_buffer_arc_sec,
            dem_force_download: self.dem_force_download,
            orbit_interpolation_points: self.orbit_interpolation_points,
            solver: self.solver.clone(),
            parallel_bursts: self.parallel_bursts,
        }
    }
}

/// Settings for projecting radar rasters onto the LUT grid
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Looks along azimuth (presumming factor)
    pub multilook_azimuth: usize,
    /// Looks along range (presumming factor)
    pub multilook_range: usize,
    pub kernel: Kernel,
    pub complex_interpolation: ComplexInterpolation,
    /// Output the phase of complex rasters
    pub write_phase: bool,
    /// Output the magnitude; ignored when `write_phase` is set
    pub magnitude_only: bool,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            multilook_azimuth: 1,
            multilook_range: 1,
            kernel: Kernel::Bicubic,
            complex_interpolation: ComplexInterpolation::Cartesian,
            write_phase: false,
            magnitude_only: false,
        }
    }
}

impl GeocodeConfig {
    pub fn from_json_str(json: &str) -> SarResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SarResult<()> {
        if self.multilook_azimuth == 0 || self.multilook_range == 0 {
            return Err(SarError::Configuration(format!(
                "Multilook factors must be positive, got {}x{}",
                self.multilook_azimuth, self.multilook_range
            )));
        }
        Ok(())
    }
}

/// Settings of the geocoded InSAR products
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductConfig {
    pub write_coherence: bool,
    pub write_interferogram: bool,
    pub write_primary_amplitude: bool,
    pub write_secondary_amplitude: bool,
    /// Coherence boxcar along azimuth (lines)
    pub boxcar_azimuth: usize,
    /// Coherence boxcar along range (samples)
    pub boxcar_range: usize,
    pub multilook_azimuth: usize,
    pub multilook_range: usize,
    /// Kernel for coherence and amplitudes
    pub kernel: Kernel,
    /// Kernel for the interferometric phase
    pub kernel_phase: Kernel,
    pub complex_interpolation: ComplexInterpolation,
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            write_coherence: true,
            write_interferogram: true,
            write_primary_amplitude: true,
            write_secondary_amplitude: false,
            boxcar_azimuth: 3,
            boxcar_range: 10,
            multilook_azimuth: 1,
            multilook_range: 4,
            kernel: Kernel::Bicubic,
            kernel_phase: Kernel::Nearest,
            complex_interpolation: ComplexInterpolation::Cartesian,
        }
    }
}

impl ProductConfig {
    pub fn from_json_str(json: &str) -> SarResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SarResult<()> {
        if !self.write_coherence && !self.write_interferogram {
            return Err(SarError::Configuration(
                "At least one of coherence and interferogram must be requested".to_string(),
            ));
        }
        if self.write_coherence && (self.boxcar_azimuth == 0 || self.boxcar_range == 0) {
            return Err(SarError::Configuration(format!(
                "Boxcar must be at least 1x1, got {}x{}",
                self.boxcar_azimuth, self.boxcar_range
            )));
        }
        self.geocode_config(false).validate()
    }

    /// Geocoding settings for one product; phase products use `kernel_phase`
    pub fn geocode_config(&self, phase: bool) -> GeocodeConfig {
        GeocodeConfig {
            multilook_azimuth: self.multilook_azimuth,
            multilook_range: self.multilook_range,
            kernel: if phase { self.kernel_phase } else { self.kernel },
            complex_interpolation: self.complex_interpolation,
            write_phase: phase,
            magnitude_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = InsarConfig::default();
        config.validate().unwrap();
        assert_eq!(config.burst_range(9).unwrap(), 1..=9);
        GeocodeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_json_partial_override() {
        let config = InsarConfig::from_json_str(
            r#"{ "min_burst": 2, "max_burst": 4, "warp_kernel": "bicubic6", "apply_fast_esd": false }"#,
        )
        .unwrap();
        assert_eq!(config.burst_range(9).unwrap(), 2..=4);
        assert_eq!(config.warp_kernel, Kernel::Bicubic6);
        assert!(!config.apply_fast_esd);
        assert_eq!(config.dem_upsampling, 1.8);
    }

    #[test]
    fn test_unknown_kernel_rejected() {
        assert!(InsarConfig::from_json_str(r#"{ "warp_kernel": "lanczos" }"#).is_err());
    }

    #[test]
    fn test_burst_range_checks() {
        let mut config = InsarConfig { min_burst: 3, max_burst: Some(2), ..Default::default() };
        assert!(matches!(config.validate(), Err(SarError::Configuration(_))));
        config.max_burst = Some(12);
        assert!(config.burst_range(9).is_err());
        config.max_burst = None;
        config.min_burst = 10;
        assert!(config.burst_range(9).is_err());
    }

    #[test]
    fn test_bad_numeric_settings() {
        let config = InsarConfig { dem_upsampling: 0.0, ..Default::default() };
        assert!(config.validate().is_err());
        let geo = GeocodeConfig { multilook_range: 0, ..Default::default() };
        assert!(geo.validate().is_err());
    }

    #[test]
    fn test_product_defaults_and_phase_kernel() {
        let config = ProductConfig::default();
        config.validate().unwrap();
        let phase = config.geocode_config(true);
        assert_eq!(phase.kernel, Kernel::Nearest);
        assert!(phase.write_phase);
        let amp = config.geocode_config(false);
        assert_eq!(amp.kernel, Kernel::Bicubic);
        assert_eq!((amp.multilook_azimuth, amp.multilook_range), (1, 4));
    }

    #[test]
    fn test_products_need_coherence_or_interferogram() {
        let err = ProductConfig::from_json_str(r#"{ "write_coherence": false, "write_interferogram": false }"#);
        assert!(matches!(err, Err(SarError::Configuration(_))));
        let ifg_only = ProductConfig::from_json_str(r#"{ "write_coherence": false, "boxcar_range": 0 }"#).unwrap();
        assert!(ifg_only.write_interferogram);
        assert!(ProductConfig::from_json_str(r#"{ "multilook_range": 0 }"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "dem_buffer_arc_sec": 20.0, "parallel_bursts": true }}"#).unwrap();
        let config = InsarConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.dem_buffer_arc_sec, 20.0);
        assert!(config.parallel_bursts);

        let back = InsarConfig::from_json_str(&config.to_json().unwrap()).unwrap();
        assert!(back.parallel_bursts);
    }
}
