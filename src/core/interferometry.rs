//! Interferometric products computed from coregistered, stitched SLCs

use crate::types::{SarComplex, SarError, SarImage, SarRealImage, SarResult};
use ndarray::{Array2, Zip};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

fn check_same_shape(primary: &SarImage, secondary: &SarImage) -> SarResult<()> {
    if primary.dim() != secondary.dim() {
        return Err(SarError::Configuration(format!(
            "Primary {:?} and secondary {:?} rasters differ in shape",
            primary.dim(),
            secondary.dim()
        )));
    }
    Ok(())
}

/// Complex interferogram `p * conj(s)`
pub fn interferogram(primary: &SarImage, secondary: &SarImage) -> SarResult<SarImage> {
    check_same_shape(primary, secondary)?;
    log::info!("Computing interferogram");
    Ok(Zip::from(primary)
        .and(secondary)
        .par_map_collect(|p, s| p * s.conj()))
}

/// Amplitude `|x|` of a complex raster
pub fn amplitude(image: &SarImage) -> SarRealImage {
    log::info!("Computing amplitude");
    image.mapv(|v| v.norm())
}

/// Coherence estimation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherenceParams {
    /// Boxcar size along azimuth (lines)
    pub box_azimuth: usize,
    /// Boxcar size along range (samples)
    pub box_range: usize,
    /// Keep only the coherence magnitude
    pub magnitude: bool,
    /// Also return the unfiltered interferogram
    pub with_interferogram: bool,
}

impl Default for CoherenceParams {
    fn default() -> Self {
        Self {
            box_azimuth: 3,
            box_range: 10,
            magnitude: true,
            with_interferogram: true,
        }
    }
}

/// Coherence as magnitude or complex values
#[derive(Debug, Clone)]
pub enum Coherence {
    Magnitude(SarRealImage),
    Complex(SarImage),
}

impl Coherence {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Coherence::Magnitude(a) => a.dim(),
            Coherence::Complex(a) => a.dim(),
        }
    }

    pub fn magnitude(&self) -> SarRealImage {
        match self {
            Coherence::Magnitude(a) => a.clone(),
            Coherence::Complex(a) => a.mapv(|v| v.norm()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoherenceProducts {
    pub coherence: Coherence,
    pub interferogram: Option<SarImage>,
}

/// Summed-area table with one extra leading row and column
struct IntegralImage {
    table: Array2<f64>,
}

impl IntegralImage {
    fn new(values: &Array2<f64>) -> Self {
        let (rows, cols) = values.dim();
        let mut table = Array2::<f64>::zeros((rows + 1, cols + 1));
        for i in 0..rows {
            let mut row_sum = 0.0;
            for j in 0..cols {
                row_sum += values[[i, j]];
                table[[i + 1, j + 1]] = table[[i, j + 1]] + row_sum;
            }
        }
        Self { table }
    }

    /// Sum over rows `[r0, r1)` and columns `[c0, c1)`
    fn sum(&self, r0: usize, r1: usize, c0: usize, c1: usize) -> f64 {
        self.table[[r1, c1]] - self.table[[r0, c1]] - self.table[[r1, c0]] + self.table[[r0, c0]]
    }
}

/// Window bounds `[start, end)` of a centred box of `size` around `i`
fn box_bounds(i: usize, size: usize, n: usize) -> (usize, usize) {
    let start = i.saturating_sub(size / 2);
    let end = (i + size - size / 2).min(n);
    (start, end)
}

/// Centred boxcar sums of `values`; NaN samples contribute zero. Also
/// returns the number of finite samples in each window.
fn boxcar_sums(values: &Array2<f64>, box_az: usize, box_rg: usize) -> (Array2<f64>, Array2<f64>) {
    let (rows, cols) = values.dim();
    let finite = values.mapv(|v| if v.is_finite() { v } else { 0.0 });
    let counts = values.mapv(|v| if v.is_finite() { 1.0 } else { 0.0 });
    let sums = IntegralImage::new(&finite);
    let valid = IntegralImage::new(&counts);

    let mut out_sum = Array2::<f64>::zeros((rows, cols));
    let mut out_count = Array2::<f64>::zeros((rows, cols));
    Zip::indexed(&mut out_sum)
        .and(&mut out_count)
        .par_for_each(|(i, j), s, c| {
            let (r0, r1) = box_bounds(i, box_az, rows);
            let (c0, c1) = box_bounds(j, box_rg, cols);
            *s = sums.sum(r0, r1, c0, c1);
            *c = valid.sum(r0, r1, c0, c1);
        });
    (out_sum, out_count)
}

/// NaN-aware centred boxcar mean of a real raster. Windows without any
/// finite sample give NaN.
pub fn boxcar(values: &Array2<f64>, box_az: usize, box_rg: usize) -> SarResult<Array2<f64>> {
    check_box(box_az, box_rg)?;
    let (sum, count) = boxcar_sums(values, box_az, box_rg);
    Ok(Zip::from(&sum)
        .and(&count)
        .map_collect(|&s, &c| if c > 0.0 { s / c } else { f64::NAN }))
}

fn check_box(box_az: usize, box_rg: usize) -> SarResult<()> {
    if box_az == 0 || box_rg == 0 {
        return Err(SarError::Configuration(format!(
            "Boxcar size must be positive, got {}x{}",
            box_az, box_rg
        )));
    }
    Ok(())
}

/// Complex coherence `<p s*> / sqrt(<|p|^2> <|s|^2>)` over a boxcar window.
///
/// NaN samples are left out of the window sums (the powers treat them as
/// zero). Pixels where the interferogram itself is NaN stay NaN.
pub fn coherence(primary: &SarImage, secondary: &SarImage, params: &CoherenceParams) -> SarResult<CoherenceProducts> {
    check_same_shape(primary, secondary)?;
    check_box(params.box_azimuth, params.box_range)?;
    if params.with_interferogram {
        log::info!("Computing coherence & interferogram");
    } else {
        log::info!("Computing coherence");
    }

    let ifg = Zip::from(primary)
        .and(secondary)
        .par_map_collect(|p, s| p * s.conj());
    let ifg_re = ifg.mapv(|v| v.re as f64);
    let ifg_im = ifg.mapv(|v| v.im as f64);
    let power_p = primary.mapv(|v| v.norm_sqr() as f64);
    let power_s = secondary.mapv(|v| v.norm_sqr() as f64);

    let (b_az, b_rg) = (params.box_azimuth, params.box_range);
    let (sum_re, _) = boxcar_sums(&ifg_re, b_az, b_rg);
    let (sum_im, _) = boxcar_sums(&ifg_im, b_az, b_rg);
    let (sum_p, _) = boxcar_sums(&power_p, b_az, b_rg);
    let (sum_s, _) = boxcar_sums(&power_s, b_az, b_rg);

    let nan = SarComplex::new(f32::NAN, f32::NAN);
    let mut coh = Array2::<SarComplex>::from_elem(ifg.dim(), nan);
    Zip::from(&mut coh)
        .and(&ifg)
        .and(&sum_re)
        .and(&sum_im)
        .and(&sum_p)
        .and(&sum_s)
        .par_for_each(|c, v, &re, &im, &pp, &ps| {
            if v.re.is_nan() || v.im.is_nan() {
                return;
            }
            let denom = (pp * ps).sqrt();
            if denom > 0.0 {
                let value = Complex::new(re, im) / denom;
                *c = SarComplex::new(value.re as f32, value.im as f32);
            }
        });

    let coherence = if params.magnitude {
        Coherence::Magnitude(coh.mapv(|v| v.norm()))
    } else {
        Coherence::Complex(coh)
    };
    Ok(CoherenceProducts {
        coherence,
        interferogram: if params.with_interferogram { Some(ifg) } else { None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn speckle(rows: usize, cols: usize) -> SarImage {
        Array2::from_shape_fn((rows, cols), |(i, j)| {
            let phi = ((i * 13 + j * 29) % 41) as f32 * 0.5;
            SarComplex::from_polar(1.0 + ((i + j) % 4) as f32, phi)
        })
    }

    #[test]
    fn test_interferogram_and_amplitude() {
        let p = Array2::from_elem((2, 2), SarComplex::new(0.0, 2.0));
        let s = Array2::from_elem((2, 2), SarComplex::new(1.0, 0.0));
        let ifg = interferogram(&p, &s).unwrap();
        assert_eq!(ifg[[0, 0]], SarComplex::new(0.0, 2.0));
        assert_eq!(amplitude(&p)[[1, 1]], 2.0);
        let q = Array2::from_elem((2, 3), SarComplex::new(1.0, 0.0));
        assert!(matches!(interferogram(&p, &q), Err(SarError::Configuration(_))));
    }

    #[test]
    fn test_identical_images_are_fully_coherent() {
        let p = speckle(12, 15);
        let mut s = p.clone();
        s.mapv_inplace(|v| v * SarComplex::from_polar(1.0, 0.3));
        let out = coherence(&p, &s, &CoherenceParams { magnitude: false, ..Default::default() }).unwrap();
        match &out.coherence {
            Coherence::Complex(c) => {
                for v in c.iter() {
                    assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-4);
                    assert_abs_diff_eq!(v.arg(), -0.3, epsilon = 1e-4);
                }
            }
            Coherence::Magnitude(_) => panic!("expected complex coherence"),
        }
        assert!(out.interferogram.is_some());
    }

    #[test]
    fn test_nan_pixels_stay_nan() {
        let mut p = speckle(8, 8);
        p[[4, 4]] = SarComplex::new(f32::NAN, f32::NAN);
        let out = coherence(&p, &p, &CoherenceParams { with_interferogram: false, ..Default::default() }).unwrap();
        let mag = out.coherence.magnitude();
        assert!(mag[[4, 4]].is_nan());
        assert_abs_diff_eq!(mag[[4, 5]], 1.0, epsilon = 1e-4);
        assert!(out.interferogram.is_none());
    }

    #[test]
    fn test_boxcar_mean_with_nan() {
        let mut v = Array2::from_elem((3, 3), 2.0);
        v[[1, 1]] = f64::NAN;
        let b = boxcar(&v, 3, 3).unwrap();
        assert_abs_diff_eq!(b[[1, 1]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b[[0, 0]], 2.0, epsilon = 1e-12);
        assert!(boxcar(&v, 0, 3).is_err());
        let all_nan = Array2::from_elem((2, 2), f64::NAN);
        assert!(boxcar(&all_nan, 3, 3).unwrap()[[0, 0]].is_nan());
    }
}
