//! DEM-assisted geocoding of bursts into per-burst lookup tables

use crate::core::geometry;
use crate::core::lut::Lut;
use crate::core::orbit::OrbitInterpolator;
use crate::core::range_doppler::{RangeDopplerSolver, SolverParams, ZeroDopplerSolution};
use crate::io::dem::DemTile;
use crate::io::swath::SwathMetadata;
use crate::types::{BoundingBox, SarResult};
use ndarray::{Array2, Zip};

/// Radar timing of one burst, used to turn zero-Doppler solutions into
/// fractional burst pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstGeometry {
    /// First line time in seconds since the orbit reference time
    pub first_line_time: f64,
    pub azimuth_time_interval: f64,
    pub near_range: f64,
    pub range_pixel_spacing: f64,
    pub lines: usize,
    pub samples: usize,
}

impl BurstGeometry {
    pub fn new(meta: &SwathMetadata, orbit: &OrbitInterpolator, burst_idx: usize) -> SarResult<Self> {
        let burst = meta.burst(burst_idx)?;
        Ok(Self {
            first_line_time: orbit.time_of(burst.azimuth_time),
            azimuth_time_interval: meta.azimuth_time_interval,
            near_range: meta.near_range(),
            range_pixel_spacing: meta.range_pixel_spacing(),
            lines: meta.lines_per_burst,
            samples: meta.samples_per_burst,
        })
    }

    /// Fractional (line, sample) of a zero-Doppler solution
    pub fn to_pixel(&self, sol: &ZeroDopplerSolution) -> (f64, f64) {
        (
            (sol.azimuth_time - self.first_line_time) / self.azimuth_time_interval,
            (sol.slant_range - self.near_range) / self.range_pixel_spacing,
        )
    }

    /// Azimuth time and slant range of a fractional (line, sample)
    pub fn to_time_range(&self, line: f64, sample: f64) -> (f64, f64) {
        (
            self.first_line_time + line * self.azimuth_time_interval,
            self.near_range + sample * self.range_pixel_spacing,
        )
    }
}

/// Projects DEM cells into the radar geometry of a swath's bursts
pub struct BurstGeocoder<'a> {
    meta: &'a SwathMetadata,
    solver: RangeDopplerSolver<'a>,
}

impl<'a> BurstGeocoder<'a> {
    pub fn new(meta: &'a SwathMetadata, orbit: &'a OrbitInterpolator) -> Self {
        Self::with_params(meta, orbit, SolverParams::default())
    }

    pub fn with_params(meta: &'a SwathMetadata, orbit: &'a OrbitInterpolator, params: SolverParams) -> Self {
        Self {
            meta,
            solver: RangeDopplerSolver::with_params(orbit, params),
        }
    }

    pub fn solver(&self) -> &RangeDopplerSolver<'a> {
        &self.solver
    }

    pub fn burst_geometry(&self, burst_idx: usize) -> SarResult<BurstGeometry> {
        BurstGeometry::new(self.meta, self.solver.orbit(), burst_idx)
    }

    /// Geocode burst `burst_idx` (1-based) over `dem` upsampled by `upsampling`.
    ///
    /// The resulting LUT has the shape and geotransform of the upsampled DEM.
    /// Cells with nodata elevation, failed inversion or an azimuth outside
    /// `[-0.5, lines_per_burst - 0.5]` are NaN.
    pub fn geocode_burst(&self, burst_idx: usize, dem: &DemTile, upsampling: f64) -> SarResult<Lut> {
        let geom = self.burst_geometry(burst_idx)?;
        let dem = dem.upsample(upsampling)?;
        let (rows, cols) = dem.dim();
        log::debug!(
            "Geocoding burst {} of {} over a {}x{} DEM grid",
            burst_idx,
            self.meta.swath,
            rows,
            cols
        );

        let mut azimuth = Array2::<f64>::from_elem((rows, cols), f64::NAN);
        let mut range = Array2::<f64>::from_elem((rows, cols), f64::NAN);
        let az_max = geom.lines as f64 - 0.5;

        let geocode_cell = |(i, j): (usize, usize), az: &mut f64, rg: &mut f64, &h: &f32| {
            if !dem.is_valid(h) {
                return;
            }
            let (lon, lat) = dem.transform.pixel_center(i, j);
            let xyz = geometry::geodetic_to_ecef(lat, lon, h as f64);
            let sol = self.solver.solve(&xyz);
            if !sol.is_valid() {
                return;
            }
            let (line, sample) = geom.to_pixel(&sol);
            if line >= -0.5 && line <= az_max {
                *az = line;
                *rg = sample;
            }
        };

        let zip = Zip::indexed(&mut azimuth).and(&mut range).and(&dem.elevation);
        #[cfg(feature = "parallel")]
        zip.par_for_each(geocode_cell);
        #[cfg(not(feature = "parallel"))]
        zip.for_each(geocode_cell);

        let lut = Lut::new(azimuth, range, dem.transform.clone(), dem.crs.clone())?;
        let valid = lut.valid_count();
        if valid == 0 {
            log::warn!(
                "Burst {} of {}: no DEM cell falls inside the burst",
                burst_idx,
                self.meta.swath
            );
        } else {
            log::debug!("Burst {}: {} of {} LUT cells resolved", burst_idx, valid, rows * cols);
        }
        Ok(lut)
    }

    /// Geographic footprint of a burst at constant ellipsoidal `height`,
    /// from the forward projection of its four corners
    pub fn burst_footprint(&self, burst_idx: usize, height: f64) -> SarResult<Option<BoundingBox>> {
        let geom = self.burst_geometry(burst_idx)?;
        let last_line = geom.lines.saturating_sub(1) as f64;
        let last_sample = geom.samples.saturating_sub(1) as f64;

        let mut corners = Vec::with_capacity(4);
        for &(line, sample) in &[(0.0, 0.0), (0.0, last_sample), (last_line, 0.0), (last_line, last_sample)] {
            let (t, r) = geom.to_time_range(line, sample);
            match self.solver.forward_project(t, r, height) {
                Some(xyz) => {
                    let (lat, lon, _) = geometry::ecef_to_geodetic(&xyz);
                    corners.push((lon, lat));
                }
                None => {
                    log::warn!(
                        "Burst {} corner ({}, {}) does not intersect the ellipsoid at {} m",
                        burst_idx,
                        line,
                        sample,
                        height
                    );
                    return Ok(None);
                }
            }
        }
        Ok(BoundingBox::from_points(&corners))
    }
}
