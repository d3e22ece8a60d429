use crate::types::{BoundingBox, GeoTransform, SarError, SarResult};
use ndarray::{s, Array2};
#[cfg(feature = "gdal")]
use std::path::{Path, PathBuf};

/// Elevation raster covering one burst footprint, in geographic coordinates
#[derive(Debug, Clone)]
pub struct DemTile {
    /// Ellipsoidal heights in meters
    pub elevation: Array2<f32>,
    pub transform: GeoTransform,
    /// CRS definition, e.g. "EPSG:4326"
    pub crs: String,
    pub nodata: Option<f32>,
}

impl DemTile {
    pub fn dim(&self) -> (usize, usize) {
        self.elevation.dim()
    }

    /// Whether an elevation sample is usable
    pub fn is_valid(&self, value: f32) -> bool {
        value.is_finite() && self.nodata.map_or(true, |nd| value != nd)
    }

    /// Bilinearly upsample the tile by `factor`.
    ///
    /// The pixel size is divided by `factor` and the top-left corner is kept,
    /// so the upsampled grid covers the same area. Nodata samples become NaN.
    pub fn upsample(&self, factor: f64) -> SarResult<DemTile> {
        if !(factor > 0.0) || !factor.is_finite() {
            return Err(SarError::Configuration(format!(
                "DEM upsampling factor must be positive, got {}",
                factor
            )));
        }
        if (factor - 1.0).abs() < 1e-12 {
            return Ok(self.clone());
        }

        let (height, width) = self.dim();
        let target_height = ((height as f64 * factor).floor() as usize).max(1);
        let target_width = ((width as f64 * factor).floor() as usize).max(1);
        let target_transform = GeoTransform::north_up(
            self.transform.top_left_x,
            self.transform.top_left_y,
            self.transform.pixel_width / factor,
            self.transform.pixel_height / factor,
        );

        log::debug!(
            "Upsampling DEM by {:.2}: {}x{} -> {}x{}",
            factor,
            height,
            width,
            target_height,
            target_width
        );

        let elevation = resample_dem(
            &self.elevation,
            self.nodata,
            &self.transform,
            &target_transform,
            (target_height, target_width),
        )?;

        Ok(DemTile {
            elevation,
            transform: target_transform,
            crs: self.crs.clone(),
            nodata: None,
        })
    }
}

/// Resample a DEM onto a target grid with bilinear interpolation between
/// pixel centres. Edge pixels are clamped; nodata samples and points
/// outside the source give NaN.
pub fn resample_dem(
    dem: &Array2<f32>,
    nodata: Option<f32>,
    source_transform: &GeoTransform,
    target_transform: &GeoTransform,
    target_shape: (usize, usize),
) -> SarResult<Array2<f32>> {
    let (source_height, source_width) = dem.dim();
    if source_height == 0 || source_width == 0 {
        return Err(SarError::InvalidFormat("Empty DEM".to_string()));
    }

    let valid = |v: f32| v.is_finite() && nodata.map_or(true, |nd| v != nd);

    let resampled = Array2::from_shape_fn(target_shape, |(i, j)| {
        let (x, y) = target_transform.pixel_center(i, j);
        let (row, col) = source_transform.map_to_pixel(x, y);
        // centre-based fractional indices
        let row = row - 0.5;
        let col = col - 0.5;

        if row < -0.5 || col < -0.5 || row > source_height as f64 - 0.5 || col > source_width as f64 - 0.5 {
            return f32::NAN;
        }

        let row = row.clamp(0.0, (source_height - 1) as f64);
        let col = col.clamp(0.0, (source_width - 1) as f64);
        let y1 = row.floor() as usize;
        let x1 = col.floor() as usize;
        let y2 = (y1 + 1).min(source_height - 1);
        let x2 = (x1 + 1).min(source_width - 1);
        let dy = row - y1 as f64;
        let dx = col - x1 as f64;

        let v11 = dem[[y1, x1]];
        let v12 = dem[[y2, x1]];
        let v21 = dem[[y1, x2]];
        let v22 = dem[[y2, x2]];
        if !(valid(v11) && valid(v12) && valid(v21) && valid(v22)) {
            return f32::NAN;
        }

        let interpolated = v11 as f64 * (1.0 - dx) * (1.0 - dy)
            + v21 as f64 * dx * (1.0 - dy)
            + v12 as f64 * (1.0 - dx) * dy
            + v22 as f64 * dx * dy;
        interpolated as f32
    });

    Ok(resampled)
}

/// Source of DEM tiles covering burst footprints
pub trait DemProvider: Sync {
    /// Fetch elevations covering `footprint` grown by `buffer_arc_sec`.
    /// `force_refresh` bypasses any local cache.
    fn fetch_dem_tile(
        &self,
        footprint: &BoundingBox,
        buffer_arc_sec: f64,
        force_refresh: bool,
    ) -> SarResult<DemTile>;
}

/// Crop a north-up DEM to a bounding box (whole pixels, inclusive)
pub fn crop_dem(dem: &DemTile, bbox: &BoundingBox) -> SarResult<DemTile> {
    if !dem.transform.is_north_up() {
        return Err(SarError::InvalidFormat(
            "Only north-up DEM geotransforms are supported".to_string(),
        ));
    }
    let (height, width) = dem.dim();
    let gt = &dem.transform;

    let (row_a, col_a) = gt.map_to_pixel(bbox.min_lon, bbox.max_lat);
    let (row_b, col_b) = gt.map_to_pixel(bbox.max_lon, bbox.min_lat);
    // tolerate round-off when the box lies on pixel edges
    const EDGE_EPS: f64 = 1e-6;
    let row_min = (row_a.min(row_b) + EDGE_EPS).floor().max(0.0) as usize;
    let row_max = ((row_a.max(row_b) - EDGE_EPS).ceil() as isize).min(height as isize);
    let col_min = (col_a.min(col_b) + EDGE_EPS).floor().max(0.0) as usize;
    let col_max = ((col_a.max(col_b) - EDGE_EPS).ceil() as isize).min(width as isize);

    if row_max <= row_min as isize || col_max <= col_min as isize {
        return Err(SarError::DataUnavailable(format!(
            "Requested bounding box {:?} does not overlap with DEM coverage",
            bbox
        )));
    }
    let (row_max, col_max) = (row_max as usize, col_max as usize);

    if row_min == 0 || col_min == 0 || row_max == height || col_max == width {
        log::warn!("DEM does not fully cover the requested area {:?}", bbox);
    }

    Ok(DemTile {
        elevation: dem.elevation.slice(s![row_min..row_max, col_min..col_max]).to_owned(),
        transform: GeoTransform::north_up(
            gt.top_left_x + col_min as f64 * gt.pixel_width,
            gt.top_left_y + row_min as f64 * gt.pixel_height,
            gt.pixel_width,
            gt.pixel_height,
        ),
        crs: dem.crs.clone(),
        nodata: dem.nodata,
    })
}

/// DEM already loaded in memory, cropped on request
pub struct InMemoryDem {
    dem: DemTile,
}

impl InMemoryDem {
    pub fn new(dem: DemTile) -> Self {
        Self { dem }
    }
}

impl DemProvider for InMemoryDem {
    fn fetch_dem_tile(
        &self,
        footprint: &BoundingBox,
        buffer_arc_sec: f64,
        _force_refresh: bool,
    ) -> SarResult<DemTile> {
        crop_dem(&self.dem, &footprint.buffered(buffer_arc_sec / 3600.0))
    }
}

/// DEM read from a GDAL-readable file (GeoTIFF, VRT mosaic, ...)
#[cfg(feature = "gdal")]
pub struct GdalDemProvider {
    path: PathBuf,
}

#[cfg(feature = "gdal")]
impl GdalDemProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[cfg(feature = "gdal")]
impl DemProvider for GdalDemProvider {
    fn fetch_dem_tile(
        &self,
        footprint: &BoundingBox,
        buffer_arc_sec: f64,
        _force_refresh: bool,
    ) -> SarResult<DemTile> {
        use gdal::Dataset;

        log::info!("Reading DEM from: {}", self.path.display());
        let dataset = Dataset::open(&self.path).map_err(|e| {
            SarError::DataUnavailable(format!("Cannot open DEM {}: {}", self.path.display(), e))
        })?;
        let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
        let crs = dataset
            .spatial_ref()
            .and_then(|srs| srs.to_wkt())
            .unwrap_or_else(|_| "EPSG:4326".to_string());
        let (width, height) = dataset.raster_size();

        let rasterband = dataset.rasterband(1)?;
        let nodata = rasterband.no_data_value().map(|v| v as f32);
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
        let elevation = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| SarError::Processing(format!("Failed to reshape DEM data: {}", e)))?;

        let full = DemTile {
            elevation,
            transform,
            crs,
            nodata,
        };
        crop_dem(&full, &footprint.buffered(buffer_arc_sec / 3600.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp_dem() -> DemTile {
        DemTile {
            elevation: Array2::from_shape_fn((10, 20), |(i, j)| (i * 100 + j) as f32),
            transform: GeoTransform::north_up(10.0, 46.0, 0.01, -0.01),
            crs: "EPSG:4326".to_string(),
            nodata: Some(-32768.0),
        }
    }

    #[test]
    fn test_upsample_keeps_extent_and_values() {
        let dem = ramp_dem();
        let up = dem.upsample(2.0).unwrap();
        assert_eq!(up.dim(), (20, 40));
        assert_abs_diff_eq!(up.transform.pixel_width, 0.005, epsilon = 1e-15);
        assert_eq!(up.transform.top_left_x, 10.0);

        // centre of upsampled pixel (5, 9) lies between source centres
        let (x, y) = up.transform.pixel_center(5, 9);
        let (r, c) = dem.transform.map_to_pixel(x, y);
        let expected = (r - 0.5) * 100.0 + (c - 0.5);
        assert_abs_diff_eq!(up.elevation[[5, 9]] as f64, expected, epsilon = 1e-3);
    }

    #[test]
    fn test_upsample_rejects_bad_factor() {
        assert!(matches!(ramp_dem().upsample(0.0), Err(SarError::Configuration(_))));
        assert!(ramp_dem().upsample(f64::NAN).is_err());
    }

    #[test]
    fn test_nodata_becomes_nan() {
        let mut dem = ramp_dem();
        dem.elevation[[4, 4]] = -32768.0;
        let up = dem.upsample(2.0).unwrap();
        assert!(up.elevation[[8, 8]].is_nan() || up.elevation[[9, 9]].is_nan());
        assert!(up.elevation[[0, 0]].is_finite());
    }

    #[test]
    fn test_in_memory_crop() {
        let provider = InMemoryDem::new(ramp_dem());
        let bbox = BoundingBox { min_lon: 10.05, max_lon: 10.1, min_lat: 45.93, max_lat: 45.96 };
        let tile = provider.fetch_dem_tile(&bbox, 0.0, false).unwrap();
        assert_eq!(tile.dim(), (3, 5));
        assert_abs_diff_eq!(tile.transform.top_left_x, 10.05, epsilon = 1e-12);
        assert_abs_diff_eq!(tile.transform.top_left_y, 45.96, epsilon = 1e-12);
        assert_eq!(tile.elevation[[0, 0]], ramp_dem().elevation[[4, 5]]);
    }

    #[test]
    fn test_crop_outside_coverage_is_unavailable() {
        let provider = InMemoryDem::new(ramp_dem());
        let bbox = BoundingBox { min_lon: 50.0, max_lon: 51.0, min_lat: 0.0, max_lat: 1.0 };
        assert!(matches!(
            provider.fetch_dem_tile(&bbox, 0.0, false),
            Err(SarError::DataUnavailable(_))
        ));
    }
}
