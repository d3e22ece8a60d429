//! Projection of radar-geometry rasters onto the geographic LUT grid

use crate::config::GeocodeConfig;
use crate::core::lut::Lut;
use crate::core::resample::{presum, Interpolable, Resampler};
use crate::types::{GeoTransform, SarImage, SarRealImage, SarResult};
use ndarray::Array2;

/// Nodata value of geocoded phase rasters
pub const PHASE_NODATA: f32 = -9999.0;
/// Nodata value of geocoded magnitude rasters
pub const MAGNITUDE_NODATA: f32 = 0.0;

/// Single-band raster in radar geometry
#[derive(Debug, Clone)]
pub enum RadarRaster {
    Real(SarRealImage),
    Complex(SarImage),
}

impl RadarRaster {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            RadarRaster::Real(a) => a.dim(),
            RadarRaster::Complex(a) => a.dim(),
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, RadarRaster::Complex(_))
    }
}

/// Raster on the geographic grid of a LUT
#[derive(Debug, Clone)]
pub struct GeocodedRaster {
    pub data: RadarRaster,
    pub transform: GeoTransform,
    pub crs: String,
    /// Nodata marker; `None` means NaN
    pub nodata: Option<f32>,
}

fn remap_presummed<T: Interpolable>(
    arr: &Array2<T>,
    lut: &Lut,
    mlt_az: usize,
    mlt_rg: usize,
    resampler: &Resampler,
) -> SarResult<Array2<T>> {
    if mlt_az == 1 && mlt_rg == 1 {
        return resampler.remap(arr, &lut.azimuth, &lut.range);
    }
    let presummed = presum(arr, mlt_az, mlt_rg)?;
    let rows = lut.azimuth.mapv(|az| az / mlt_az as f64);
    let cols = lut.range.mapv(|rg| rg / mlt_rg as f64);
    resampler.remap(&presummed, &rows, &cols)
}

/// Geocode a radar raster with a LUT, with optional presumming.
///
/// With `write_phase`, a complex raster is reduced to its phase (nodata
/// -9999); otherwise `magnitude_only` reduces it to its magnitude
/// (nodata 0). Real rasters keep NaN as nodata.
pub fn geocode_raster(raster: &RadarRaster, lut: &Lut, config: &GeocodeConfig) -> SarResult<GeocodedRaster> {
    config.validate()?;
    log::info!("Project image with the lookup table");

    if config.write_phase && !raster.is_complex() {
        log::warn!("write_phase: trying to write the phase of a real-valued raster, option has no effect");
    }
    if config.magnitude_only && !raster.is_complex() {
        log::warn!("magnitude_only: writing the magnitude (absolute value) of a real-valued raster");
    }

    let resampler = Resampler::new(config.kernel).with_complex_interpolation(config.complex_interpolation);
    let (mlt_az, mlt_rg) = (config.multilook_azimuth, config.multilook_range);

    let (data, nodata) = match raster {
        RadarRaster::Complex(arr) => {
            let out = remap_presummed(arr, lut, mlt_az, mlt_rg, &resampler)?;
            if config.write_phase {
                let phase = out.mapv(|v| {
                    let phi = v.arg();
                    if phi.is_nan() {
                        PHASE_NODATA
                    } else {
                        phi
                    }
                });
                (RadarRaster::Real(phase), Some(PHASE_NODATA))
            } else if config.magnitude_only {
                let mag = out.mapv(|v| {
                    let m = v.norm();
                    if m.is_nan() {
                        MAGNITUDE_NODATA
                    } else {
                        m
                    }
                });
                (RadarRaster::Real(mag), Some(MAGNITUDE_NODATA))
            } else {
                (RadarRaster::Complex(out), None)
            }
        }
        RadarRaster::Real(arr) => {
            let out = remap_presummed(arr, lut, mlt_az, mlt_rg, &resampler)?;
            if config.magnitude_only && !config.write_phase {
                let mag = out.mapv(|v| if v.is_nan() { MAGNITUDE_NODATA } else { v.abs() });
                (RadarRaster::Real(mag), Some(MAGNITUDE_NODATA))
            } else {
                (RadarRaster::Real(out), None)
            }
        }
    };

    Ok(GeocodedRaster {
        data,
        transform: lut.transform.clone(),
        crs: lut.crs.clone(),
        nodata,
    })
}
