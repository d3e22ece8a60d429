use crate::types::{GeoTransform, SarError, SarResult};
use ndarray::Array2;

/// Geographic lookup table into radar geometry.
///
/// Each cell of the geographic grid holds the fractional burst line
/// (`azimuth`) and range sample (`range`) observing it. Unresolved cells are
/// NaN in both bands.
#[derive(Debug, Clone)]
pub struct Lut {
    pub azimuth: Array2<f64>,
    pub range: Array2<f64>,
    pub transform: GeoTransform,
    pub crs: String,
}

impl Lut {
    pub fn new(
        azimuth: Array2<f64>,
        range: Array2<f64>,
        transform: GeoTransform,
        crs: String,
    ) -> SarResult<Self> {
        if azimuth.dim() != range.dim() {
            return Err(SarError::Configuration(format!(
                "LUT bands differ in shape: azimuth {:?}, range {:?}",
                azimuth.dim(),
                range.dim()
            )));
        }
        Ok(Self {
            azimuth,
            range,
            transform,
            crs,
        })
    }

    /// LUT of the given shape with every cell unresolved
    pub fn empty(shape: (usize, usize), transform: GeoTransform, crs: String) -> Self {
        Self {
            azimuth: Array2::from_elem(shape, f64::NAN),
            range: Array2::from_elem(shape, f64::NAN),
            transform,
            crs,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.azimuth.dim()
    }

    /// Radar coordinates of cell (row, col), `None` when unresolved
    pub fn get(&self, row: usize, col: usize) -> Option<(f64, f64)> {
        let az = self.azimuth[[row, col]];
        let rg = self.range[[row, col]];
        if az.is_finite() && rg.is_finite() {
            Some((az, rg))
        } else {
            None
        }
    }

    /// Number of resolved cells
    pub fn valid_count(&self) -> usize {
        self.azimuth
            .iter()
            .zip(self.range.iter())
            .filter(|(a, r)| a.is_finite() && r.is_finite())
            .count()
    }

    /// Set both bands to NaN wherever the azimuth is outside `[lower, upper)`
    /// or either band is already NaN.
    pub fn mask_azimuth(&mut self, lower: f64, upper: f64) {
        ndarray::Zip::from(&mut self.azimuth)
            .and(&mut self.range)
            .for_each(|az, rg| {
                if !(*az >= lower && *az < upper) || rg.is_nan() {
                    *az = f64::NAN;
                    *rg = f64::NAN;
                }
            });
    }
}

/// Primary LUT of one processed burst
#[derive(Debug, Clone)]
pub struct BurstLut {
    /// 1-based burst index within the swath
    pub burst_idx: usize,
    pub lut: Lut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_azimuth_clears_both_bands() {
        let az = Array2::from_shape_fn((2, 3), |(i, j)| (i * 3 + j) as f64);
        let rg = Array2::from_elem((2, 3), 7.0);
        let mut lut = Lut::new(az, rg, GeoTransform::north_up(0.0, 0.0, 1.0, -1.0), "EPSG:4326".into())
            .unwrap();
        lut.mask_azimuth(1.0, 4.0);
        assert!(lut.get(0, 0).is_none());
        assert_eq!(lut.get(0, 1), Some((1.0, 7.0)));
        assert_eq!(lut.get(1, 0), Some((3.0, 7.0)));
        assert!(lut.range[[1, 1]].is_nan());
        assert_eq!(lut.valid_count(), 3);
    }

    #[test]
    fn test_band_shape_mismatch() {
        let gt = GeoTransform::north_up(0.0, 0.0, 1.0, -1.0);
        let r = Lut::new(Array2::zeros((2, 2)), Array2::zeros((2, 3)), gt, String::new());
        assert!(matches!(r, Err(SarError::Configuration(_))));
    }
}
