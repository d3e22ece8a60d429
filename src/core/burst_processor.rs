//! Per-burst DEM-assisted coregistration of a primary/secondary swath pair

use crate::core::coregister::coregister;
use crate::core::geocode::BurstGeocoder;
use crate::core::lut::BurstLut;
use crate::core::orbit::OrbitInterpolator;
use crate::core::range_doppler::SolverParams;
use crate::core::resample::Resampler;
use crate::core::tops::{deramp_phase, topographic_phase, RangePhaseModel};
use crate::io::dem::DemProvider;
use crate::io::swath::BurstSource;
use crate::types::{SarComplex, SarError, SarImage, SarResult};
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2, Zip};
use num_complex::Complex;
use std::ops::RangeInclusive;

/// Raster holding a contiguous run of bursts stacked along azimuth.
///
/// Burst `b` occupies the fixed window starting at row
/// `(b - first_burst) * lines_per_burst`; windows never overlap.
#[derive(Debug, Clone)]
pub struct BurstAccumulator {
    data: SarImage,
    first_burst: usize,
    burst_count: usize,
    lines_per_burst: usize,
}

impl BurstAccumulator {
    /// NaN-initialised arena for bursts `bursts` (1-based, inclusive)
    pub fn new(bursts: RangeInclusive<usize>, lines_per_burst: usize, samples: usize) -> SarResult<Self> {
        let (first, last) = (*bursts.start(), *bursts.end());
        if first == 0 || last < first {
            return Err(SarError::Configuration(format!(
                "Invalid burst range {}..={}",
                first, last
            )));
        }
        let burst_count = last - first + 1;
        Ok(Self {
            data: Array2::from_elem(
                (burst_count * lines_per_burst, samples),
                SarComplex::new(f32::NAN, f32::NAN),
            ),
            first_burst: first,
            burst_count,
            lines_per_burst,
        })
    }

    pub fn first_burst(&self) -> usize {
        self.first_burst
    }

    pub fn last_burst(&self) -> usize {
        self.first_burst + self.burst_count - 1
    }

    pub fn burst_count(&self) -> usize {
        self.burst_count
    }

    pub fn lines_per_burst(&self) -> usize {
        self.lines_per_burst
    }

    pub fn samples(&self) -> usize {
        self.data.ncols()
    }

    fn first_line(&self, burst_idx: usize) -> SarResult<usize> {
        if burst_idx < self.first_burst || burst_idx > self.last_burst() {
            return Err(SarError::Configuration(format!(
                "Burst {} outside accumulator range {}..={}",
                burst_idx,
                self.first_burst,
                self.last_burst()
            )));
        }
        Ok((burst_idx - self.first_burst) * self.lines_per_burst)
    }

    /// Window of burst `burst_idx`
    pub fn window(&self, burst_idx: usize) -> SarResult<ArrayView2<'_, SarComplex>> {
        let start = self.first_line(burst_idx)?;
        Ok(self.data.slice(s![start..start + self.lines_per_burst, ..]))
    }

    pub fn window_mut(&mut self, burst_idx: usize) -> SarResult<ArrayViewMut2<'_, SarComplex>> {
        let start = self.first_line(burst_idx)?;
        Ok(self.data.slice_mut(s![start..start + self.lines_per_burst, ..]))
    }

    /// Copy a full burst into its window
    pub fn write_burst(&mut self, burst_idx: usize, burst: &SarImage) -> SarResult<()> {
        let expected = (self.lines_per_burst, self.samples());
        if burst.dim() != expected {
            return Err(SarError::Configuration(format!(
                "Burst {} is {:?}, accumulator windows are {:?}",
                burst_idx,
                burst.dim(),
                expected
            )));
        }
        self.window_mut(burst_idx)?.assign(burst);
        Ok(())
    }

    /// Rows `[start, start + count)` relative to the start of burst `burst_idx`
    pub fn lines(&self, burst_idx: usize, start: usize, count: usize) -> SarResult<ArrayView2<'_, SarComplex>> {
        if start + count > self.lines_per_burst {
            return Err(SarError::Configuration(format!(
                "Lines {}..{} exceed burst length {}",
                start,
                start + count,
                self.lines_per_burst
            )));
        }
        let first = self.first_line(burst_idx)? + start;
        Ok(self.data.slice(s![first..first + count, ..]))
    }

    pub fn data(&self) -> &SarImage {
        &self.data
    }

    pub fn into_data(self) -> SarImage {
        self.data
    }
}

/// Settings of the per-burst coregistration
#[derive(Debug, Clone)]
pub struct BurstProcessingParams {
    pub resampler: Resampler,
    pub dem_upsampling: f64,
    pub dem_buffer_arc_sec: f64,
    pub dem_force_download: bool,
    pub orbit_interpolation_points: usize,
    pub solver: SolverParams,
    /// Process bursts concurrently; windows are still written one at a time
    pub parallel_bursts: bool,
}

/// Coregistered bursts and the primary LUT of each burst
#[derive(Debug)]
pub struct ProcessedBursts {
    pub primary: BurstAccumulator,
    pub secondary: BurstAccumulator,
    pub luts: Vec<BurstLut>,
}

struct BurstResult {
    primary: SarImage,
    secondary: SarImage,
    lut: BurstLut,
}

/// Coregisters secondary bursts onto primary bursts
pub struct BurstProcessor<'a> {
    primary: &'a dyn BurstSource,
    secondary: &'a dyn BurstSource,
    dem: &'a dyn DemProvider,
    params: BurstProcessingParams,
    orbit_p: OrbitInterpolator,
    orbit_s: OrbitInterpolator,
}

impl<'a> BurstProcessor<'a> {
    pub fn new(
        primary: &'a dyn BurstSource,
        secondary: &'a dyn BurstSource,
        dem: &'a dyn DemProvider,
        params: BurstProcessingParams,
    ) -> SarResult<Self> {
        let meta_p = primary.metadata();
        let meta_s = secondary.metadata();
        if meta_p.lines_per_burst != meta_s.lines_per_burst
            || meta_p.samples_per_burst != meta_s.samples_per_burst
        {
            return Err(SarError::Configuration(format!(
                "Primary bursts are {}x{}, secondary bursts are {}x{}",
                meta_p.lines_per_burst,
                meta_p.samples_per_burst,
                meta_s.lines_per_burst,
                meta_s.samples_per_burst
            )));
        }
        let orbit_p = OrbitInterpolator::new(&meta_p.orbit, params.orbit_interpolation_points)?;
        let orbit_s = OrbitInterpolator::new(&meta_s.orbit, params.orbit_interpolation_points)?;
        Ok(Self {
            primary,
            secondary,
            dem,
            params,
            orbit_p,
            orbit_s,
        })
    }

    /// Process bursts `bursts` (1-based, inclusive) into fresh accumulators
    pub fn process(&self, bursts: RangeInclusive<usize>) -> SarResult<ProcessedBursts> {
        let meta = self.primary.metadata();
        let lines = meta.lines_per_burst;
        let samples = meta.samples_per_burst;
        let mut primary = BurstAccumulator::new(bursts.clone(), lines, samples)?;
        let mut secondary = BurstAccumulator::new(bursts.clone(), lines, samples)?;
        let mut luts = Vec::with_capacity(primary.burst_count());

        let mut store = |result: BurstResult| -> SarResult<()> {
            primary.write_burst(result.lut.burst_idx, &result.primary)?;
            secondary.write_burst(result.lut.burst_idx, &result.secondary)?;
            luts.push(result.lut);
            Ok(())
        };

        if self.params.parallel_bursts {
            use rayon::prelude::*;
            let results: Vec<SarResult<BurstResult>> = bursts
                .clone()
                .into_par_iter()
                .map(|b| self.process_burst(b))
                .collect();
            for result in results {
                store(result?)?;
            }
        } else {
            for b in bursts.clone() {
                store(self.process_burst(b)?)?;
            }
        }

        Ok(ProcessedBursts {
            primary,
            secondary,
            luts,
        })
    }

    fn process_burst(&self, burst_idx: usize) -> SarResult<BurstResult> {
        log::info!("---- Processing burst {} ----", burst_idx);
        let meta_p = self.primary.metadata();
        let meta_s = self.secondary.metadata();

        let footprint = &meta_p.burst(burst_idx)?.footprint;
        let dem = self
            .dem
            .fetch_dem_tile(
                footprint,
                self.params.dem_buffer_arc_sec,
                self.params.dem_force_download,
            )
            .map_err(|e| {
                SarError::DataUnavailable(format!("DEM for burst {} could not be fetched: {}", burst_idx, e))
            })?;

        // geocoding LUTs of both bursts on the same DEM grid
        let geocoder_p = BurstGeocoder::with_params(meta_p, &self.orbit_p, self.params.solver.clone());
        let geocoder_s = BurstGeocoder::with_params(meta_s, &self.orbit_s, self.params.solver.clone());
        let lut_p = geocoder_p.geocode_burst(burst_idx, &dem, self.params.dem_upsampling)?;
        let lut_s = geocoder_s.geocode_burst(burst_idx, &dem, self.params.dem_upsampling)?;

        let arr_p = self.primary.read_burst(burst_idx, true)?;
        let arr_s = self.secondary.read_burst(burst_idx, true)?;

        // deramp secondary
        let phase_s = deramp_phase(meta_s, &self.orbit_s, burst_idx)?;
        if phase_s.dim() != arr_s.dim() {
            return Err(SarError::InvalidFormat(format!(
                "Secondary burst {} is {:?}, annotation says {:?}",
                burst_idx,
                arr_s.dim(),
                phase_s.dim()
            )));
        }
        let mut deramped = arr_s;
        Zip::from(&mut deramped).and(&phase_s).for_each(|v, &phi| {
            *v *= Complex::from_polar(1.0, phi as f32);
        });

        let map = coregister(arr_p.dim(), &lut_p, &lut_s)?;

        let resampler = &self.params.resampler;
        let mut aligned = resampler.align(&deramped, &map)?;
        let warped_phase = resampler.align(&phase_s, &map)?;

        // reramp, then remove the topographic phase difference
        let topo = topographic_phase(
            &RangePhaseModel::from_metadata(meta_p),
            &RangePhaseModel::from_metadata(meta_s),
            &map.range,
        );
        Zip::from(&mut aligned)
            .and(&warped_phase)
            .and(&topo)
            .for_each(|v, &reramp, &phi_topo| {
                let correction = Complex::from_polar(1.0, -(reramp + phi_topo));
                *v *= Complex::new(correction.re as f32, correction.im as f32);
            });

        Ok(BurstResult {
            primary: arr_p,
            secondary: aligned,
            lut: BurstLut {
                burst_idx,
                lut: lut_p,
            },
        })
    }
}
