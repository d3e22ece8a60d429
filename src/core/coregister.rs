use crate::core::lut::Lut;
use crate::types::{SarError, SarResult};
use ndarray::Array2;

/// Secondary burst coordinates for every primary burst pixel
#[derive(Debug, Clone)]
pub struct CoregistrationMap {
    /// Secondary line per primary pixel
    pub azimuth: Array2<f64>,
    /// Secondary sample per primary pixel
    pub range: Array2<f64>,
}

impl CoregistrationMap {
    pub fn dim(&self) -> (usize, usize) {
        self.azimuth.dim()
    }

    /// Fraction of primary pixels with a secondary coordinate
    pub fn coverage(&self) -> f64 {
        let total = self.azimuth.len();
        if total == 0 {
            return 0.0;
        }
        let resolved = self.azimuth.iter().filter(|v| v.is_finite()).count();
        resolved as f64 / total as f64
    }
}

/// Compose the primary and secondary LUTs of a burst into a direct
/// secondary-to-primary mapping on the primary grid of shape `primary_shape`.
///
/// Every DEM cell resolved in both LUTs is assigned to the primary pixel
/// nearest to its primary coordinate. The secondary coordinate stored there
/// is corrected by the rounding residual, and among cells hitting the same
/// pixel the one with the smallest residual is kept. Pixels that no cell
/// reaches stay NaN.
pub fn coregister(primary_shape: (usize, usize), lut_p: &Lut, lut_s: &Lut) -> SarResult<CoregistrationMap> {
    if lut_p.dim() != lut_s.dim() {
        return Err(SarError::Configuration(format!(
            "Primary and secondary LUTs must share the DEM grid: {:?} vs {:?}",
            lut_p.dim(),
            lut_s.dim()
        )));
    }

    let (lines, samples) = primary_shape;
    let mut azimuth = Array2::<f64>::from_elem(primary_shape, f64::NAN);
    let mut range = Array2::<f64>::from_elem(primary_shape, f64::NAN);
    let mut best = Array2::<f64>::from_elem(primary_shape, f64::INFINITY);

    let cells = lut_p
        .azimuth
        .iter()
        .zip(lut_p.range.iter())
        .zip(lut_s.azimuth.iter().zip(lut_s.range.iter()));

    for ((&ap, &rp), (&as_, &rs)) in cells {
        if !(ap.is_finite() && rp.is_finite() && as_.is_finite() && rs.is_finite()) {
            continue;
        }
        let i = ap.round();
        let j = rp.round();
        if i < 0.0 || j < 0.0 || i >= lines as f64 || j >= samples as f64 {
            continue;
        }
        let (di, dj) = (i - ap, j - rp);
        let residual = di * di + dj * dj;
        let (iu, ju) = (i as usize, j as usize);
        if residual < best[[iu, ju]] {
            best[[iu, ju]] = residual;
            azimuth[[iu, ju]] = i + (as_ - ap);
            range[[iu, ju]] = j + (rs - rp);
        }
    }

    let map = CoregistrationMap { azimuth, range };
    log::debug!("Coregistration map covers {:.1}% of the primary burst", 100.0 * map.coverage());
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;

    fn lut(az: Array2<f64>, rg: Array2<f64>) -> Lut {
        Lut::new(az, rg, GeoTransform::north_up(0.0, 0.0, 1.0, -1.0), "EPSG:4326".to_string()).unwrap()
    }

    /// Dense grid sampling the primary geometry at quarter-pixel steps
    fn dense_lut(lines: usize, samples: usize) -> Lut {
        let shape = (lines * 4, samples * 4);
        lut(
            Array2::from_shape_fn(shape, |(i, _)| i as f64 * 0.25 + 0.1),
            Array2::from_shape_fn(shape, |(_, j)| j as f64 * 0.25 - 0.05),
        )
    }

    #[test]
    fn test_self_composition_is_identity() {
        let p = dense_lut(6, 8);
        let map = coregister((6, 8), &p, &p).unwrap();
        for ((i, j), &az) in map.azimuth.indexed_iter() {
            assert_eq!(az, i as f64);
            assert_eq!(map.range[[i, j]], j as f64);
        }
        assert_eq!(map.coverage(), 1.0);
    }

    #[test]
    fn test_constant_shift_is_carried() {
        let p = dense_lut(5, 5);
        let mut s = p.clone();
        s.azimuth.mapv_inplace(|v| v + 1.5);
        s.range.mapv_inplace(|v| v - 0.25);
        let map = coregister((5, 5), &p, &s).unwrap();
        for ((i, j), &az) in map.azimuth.indexed_iter() {
            assert!((az - (i as f64 + 1.5)).abs() < 1e-12);
            assert!((map.range[[i, j]] - (j as f64 - 0.25)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unreached_pixels_are_nan() {
        let p = lut(Array2::from_elem((2, 2), 0.0), Array2::from_elem((2, 2), 0.0));
        let map = coregister((3, 3), &p, &p).unwrap();
        assert_eq!(map.azimuth[[0, 0]], 0.0);
        assert!(map.azimuth[[2, 2]].is_nan());
        assert!(map.range[[1, 0]].is_nan());
    }

    #[test]
    fn test_shape_mismatch_is_configuration_error() {
        let a = lut(Array2::zeros((2, 2)), Array2::zeros((2, 2)));
        let b = lut(Array2::zeros((3, 2)), Array2::zeros((3, 2)));
        assert!(matches!(coregister((2, 2), &a, &b), Err(SarError::Configuration(_))));
    }
}
