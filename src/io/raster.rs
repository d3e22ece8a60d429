//! GeoTIFF persistence of LUTs, SLC and product rasters

use crate::core::lut::Lut;
use crate::core::sar2geo::{GeocodedRaster, RadarRaster};
use crate::types::{GeoTransform, SarError, SarImage, SarResult};
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use num_complex::Complex;
use std::path::Path;

fn create<T: GdalType, P: AsRef<Path>>(
    path: P,
    shape: (usize, usize),
    bands: usize,
    transform: Option<&GeoTransform>,
    crs: Option<&str>,
) -> SarResult<Dataset> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (height, width) = shape;
    let mut dataset = driver.create_with_band_type::<T, _>(
        path.as_ref(),
        width as isize,
        height as isize,
        bands as isize,
    )?;
    if let Some(gt) = transform {
        dataset.set_geo_transform(&gt.to_gdal())?;
    }
    if let Some(definition) = crs {
        dataset.set_spatial_ref(&SpatialRef::from_definition(definition)?)?;
    }
    Ok(dataset)
}

fn write_band<T: GdalType + Copy>(dataset: &Dataset, index: isize, data: &Array2<T>, nodata: Option<f64>) -> SarResult<()> {
    let (height, width) = data.dim();
    let mut band = dataset.rasterband(index)?;
    let buffer = Buffer::new((width, height), data.iter().copied().collect());
    band.write((0, 0), (width, height), &buffer)?;
    band.set_no_data_value(nodata)?;
    Ok(())
}

fn read_band<T: GdalType + Copy>(dataset: &Dataset, index: isize) -> SarResult<Array2<T>> {
    let (width, height) = dataset.raster_size();
    let band = dataset.rasterband(index)?;
    let buffer = band.read_as::<T>((0, 0), (width, height), (width, height), None)?;
    Array2::from_shape_vec((height, width), buffer.data)
        .map_err(|e| SarError::Processing(format!("Failed to reshape band {}: {}", index, e)))
}

/// Write a LUT as a two-band (azimuth, range) Float64 GeoTIFF
pub fn write_lut<P: AsRef<Path>>(path: P, lut: &Lut) -> SarResult<()> {
    log::info!("Writing LUT: {}", path.as_ref().display());
    let dataset = create::<f64, _>(&path, lut.dim(), 2, Some(&lut.transform), Some(&lut.crs))?;
    write_band(&dataset, 1, &lut.azimuth, Some(f64::NAN))?;
    write_band(&dataset, 2, &lut.range, Some(f64::NAN))?;
    Ok(())
}

pub fn read_lut<P: AsRef<Path>>(path: P) -> SarResult<Lut> {
    let dataset = Dataset::open(path.as_ref())
        .map_err(|e| SarError::DataUnavailable(format!("Cannot open LUT {}: {}", path.as_ref().display(), e)))?;
    if dataset.raster_count() != 2 {
        return Err(SarError::InvalidFormat(format!(
            "LUT {} has {} bands, expected 2",
            path.as_ref().display(),
            dataset.raster_count()
        )));
    }
    let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
    let crs = dataset.spatial_ref().and_then(|srs| srs.to_wkt()).unwrap_or_default();
    Lut::new(read_band(&dataset, 1)?, read_band(&dataset, 2)?, transform, crs)
}

/// Write a complex raster in radar geometry as two Float32 bands (I, Q)
pub fn write_complex<P: AsRef<Path>>(path: P, image: &SarImage) -> SarResult<()> {
    log::info!("Writing complex raster: {}", path.as_ref().display());
    let dataset = create::<f32, _>(&path, image.dim(), 2, None, None)?;
    write_band(&dataset, 1, &image.mapv(|v| v.re), Some(f64::NAN))?;
    write_band(&dataset, 2, &image.mapv(|v| v.im), Some(f64::NAN))?;
    Ok(())
}

pub fn read_complex<P: AsRef<Path>>(path: P) -> SarResult<SarImage> {
    let dataset = Dataset::open(path.as_ref())
        .map_err(|e| SarError::DataUnavailable(format!("Cannot open {}: {}", path.as_ref().display(), e)))?;
    if dataset.raster_count() < 2 {
        return Err(SarError::InvalidFormat(format!(
            "{} needs I and Q bands",
            path.as_ref().display()
        )));
    }
    let i_data: Array2<f32> = read_band(&dataset, 1)?;
    let q_data: Array2<f32> = read_band(&dataset, 2)?;
    Ok(ndarray::Zip::from(&i_data)
        .and(&q_data)
        .map_collect(|&i, &q| Complex::new(i, q)))
}

/// Write a single-band Float32 raster
pub fn write_real<P: AsRef<Path>>(
    path: P,
    data: &Array2<f32>,
    transform: Option<&GeoTransform>,
    crs: Option<&str>,
    nodata: Option<f32>,
) -> SarResult<()> {
    log::info!("Writing raster: {}", path.as_ref().display());
    let dataset = create::<f32, _>(&path, data.dim(), 1, transform, crs)?;
    write_band(&dataset, 1, data, Some(nodata.map_or(f64::NAN, |v| v as f64)))
}

pub fn read_real<P: AsRef<Path>>(path: P) -> SarResult<Array2<f32>> {
    let dataset = Dataset::open(path.as_ref())
        .map_err(|e| SarError::DataUnavailable(format!("Cannot open {}: {}", path.as_ref().display(), e)))?;
    read_band(&dataset, 1)
}

/// Write a geocoded raster; complex data is stored as I/Q bands
pub fn write_geocoded<P: AsRef<Path>>(path: P, raster: &GeocodedRaster) -> SarResult<()> {
    match &raster.data {
        RadarRaster::Real(data) => write_real(&path, data, Some(&raster.transform), Some(&raster.crs), raster.nodata),
        RadarRaster::Complex(data) => {
            let dataset = create::<f32, _>(&path, data.dim(), 2, Some(&raster.transform), Some(&raster.crs))?;
            write_band(&dataset, 1, &data.mapv(|v| v.re), Some(f64::NAN))?;
            write_band(&dataset, 2, &data.mapv(|v| v.im), Some(f64::NAN))?;
            Ok(())
        }
    }
}
