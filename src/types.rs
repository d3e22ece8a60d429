use chrono::{DateTime, Utc};
use ndarray::Array2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Complex-valued SAR data type (I + jQ)
pub type SarComplex = Complex<f32>;

/// Real-valued intensity or amplitude data
pub type SarReal = f32;

/// 2D complex SAR data array (azimuth x range)
pub type SarImage = Array2<SarComplex>;

/// 2D real SAR data array (azimuth x range)
pub type SarRealImage = Array2<SarReal>;

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

/// Orbit state vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVector {
    pub time: DateTime<Utc>,
    pub position: [f64; 3],  // [x, y, z] in meters (ECEF)
    pub velocity: [f64; 3],  // [vx, vy, vz] in m/s
}

/// Precise orbit information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitData {
    pub state_vectors: Vec<StateVector>,
    pub reference_time: DateTime<Utc>,
}

impl OrbitData {
    /// Seconds elapsed between the orbit reference time and `time`
    pub fn seconds_since_reference(&self, time: DateTime<Utc>) -> f64 {
        seconds_between(self.reference_time, time)
    }
}

/// Signed number of seconds from `from` to `to`, with nanosecond resolution.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Grow the box by `degrees` on every side
    pub fn buffered(&self, degrees: f64) -> Self {
        Self {
            min_lon: self.min_lon - degrees,
            max_lon: self.max_lon + degrees,
            min_lat: self.min_lat - degrees,
            max_lat: self.max_lat + degrees,
        }
    }

    /// Smallest box containing all `(lon, lat)` points
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            min_lon: first.0,
            max_lon: first.0,
            min_lat: first.1,
            max_lat: first.1,
        };
        for &(lon, lat) in &points[1..] {
            bbox.min_lon = bbox.min_lon.min(lon);
            bbox.max_lon = bbox.max_lon.max(lon);
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lat = bbox.max_lat.max(lat);
        }
        Some(bbox)
    }
}

/// Geospatial transformation parameters (GDAL affine convention, top-left corner)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation terms
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        (
            self.top_left_x + c * self.pixel_width + r * self.rotation_x,
            self.top_left_y + c * self.rotation_y + r * self.pixel_height,
        )
    }

    /// Fractional (row, col) of a map coordinate, measured from the top-left
    /// corner. Rotation terms are ignored.
    pub fn map_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (y - self.top_left_y) / self.pixel_height,
            (x - self.top_left_x) / self.pixel_width,
        )
    }

    pub fn is_north_up(&self) -> bool {
        self.rotation_x == 0.0 && self.rotation_y == 0.0
    }
}

/// Error types for SAR processing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_seconds_between_sub_second() {
        let t0 = Utc.with_ymd_and_hms(2023, 9, 4, 6, 37, 30).unwrap();
        let t1 = t0 + chrono::Duration::microseconds(1_500_250);
        assert!((seconds_between(t0, t1) - 1.50025).abs() < 1e-9);
        assert!((seconds_between(t1, t0) + 1.50025).abs() < 1e-9);
    }

    #[test]
    fn test_geotransform_pixel_roundtrip() {
        let gt = GeoTransform::north_up(10.0, 45.0, 0.001, -0.001);
        let (x, y) = gt.pixel_center(3, 7);
        let (row, col) = gt.map_to_pixel(x, y);
        assert!((row - 3.5).abs() < 1e-9);
        assert!((col - 7.5).abs() < 1e-9);
        assert_eq!(GeoTransform::from_gdal(gt.to_gdal()), gt);
    }

    #[test]
    fn test_bbox_from_points() {
        let bbox = BoundingBox::from_points(&[(1.0, 2.0), (-1.0, 3.0), (0.5, -2.0)]).unwrap();
        assert_eq!(bbox.min_lon, -1.0);
        assert_eq!(bbox.max_lon, 1.0);
        assert_eq!(bbox.min_lat, -2.0);
        assert_eq!(bbox.max_lat, 3.0);
        assert!(BoundingBox::from_points(&[]).is_none());
    }
}
