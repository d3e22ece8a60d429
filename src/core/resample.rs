//! Sub-pixel resampling of radar rasters at fractional coordinates

use crate::core::coregister::CoregistrationMap;
use crate::types::{SarError, SarResult};
use ndarray::{Array2, ArrayView2, Zip};
use num_complex::Complex;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::str::FromStr;

const MAX_TAPS: usize = 6;

/// Interpolation kernel used when warping rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Nearest,
    Bilinear,
    /// Keys cubic convolution, a = -0.5
    Bicubic,
    /// Keys 6-point cubic convolution
    Bicubic6,
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Bicubic
    }
}

impl FromStr for Kernel {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Kernel::Nearest),
            "bilinear" => Ok(Kernel::Bilinear),
            "bicubic" => Ok(Kernel::Bicubic),
            "bicubic6" => Ok(Kernel::Bicubic6),
            other => Err(SarError::Configuration(format!(
                "Unsupported interpolation kernel '{}', expected nearest, bilinear, bicubic or bicubic6",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Kernel::Nearest => "nearest",
            Kernel::Bilinear => "bilinear",
            Kernel::Bicubic => "bicubic",
            Kernel::Bicubic6 => "bicubic6",
        };
        write!(f, "{}", name)
    }
}

fn keys4(x: f64) -> f64 {
    let x = x.abs();
    if x < 1.0 {
        1.5 * x * x * x - 2.5 * x * x + 1.0
    } else if x < 2.0 {
        -0.5 * x * x * x + 2.5 * x * x - 4.0 * x + 2.0
    } else {
        0.0
    }
}

fn keys6(x: f64) -> f64 {
    let x = x.abs();
    if x < 1.0 {
        4.0 / 3.0 * x * x * x - 7.0 / 3.0 * x * x + 1.0
    } else if x < 2.0 {
        -7.0 / 12.0 * x * x * x + 3.0 * x * x - 59.0 / 12.0 * x + 15.0 / 6.0
    } else if x < 3.0 {
        1.0 / 12.0 * x * x * x - 2.0 / 3.0 * x * x + 7.0 / 4.0 * x - 1.5
    } else {
        0.0
    }
}

/// One-dimensional interpolation stencil: clamped tap indices and weights
#[derive(Debug, Clone, Copy)]
struct Stencil {
    index: [usize; MAX_TAPS],
    weight: [f64; MAX_TAPS],
    len: usize,
    /// Tap with the largest weight
    nearest: usize,
}

impl Stencil {
    fn push(&mut self, tap: isize, weight: f64, n: usize) {
        if weight == 0.0 {
            return;
        }
        let idx = tap.clamp(0, n as isize - 1) as usize;
        if self.len == 0 || weight > self.weight[self.nearest] {
            self.nearest = self.len;
        }
        self.index[self.len] = idx;
        self.weight[self.len] = weight;
        self.len += 1;
    }
}

impl Kernel {
    /// Number of taps along one axis
    pub fn taps(&self) -> usize {
        match self {
            Kernel::Nearest => 1,
            Kernel::Bilinear => 2,
            Kernel::Bicubic => 4,
            Kernel::Bicubic6 => 6,
        }
    }

    /// Stencil at coordinate `x` on an axis of length `n`, `None` when `x`
    /// is outside the valid domain of the kernel
    fn stencil(&self, x: f64, n: usize) -> Option<Stencil> {
        if n == 0 || !x.is_finite() {
            return None;
        }
        let mut st = Stencil {
            index: [0; MAX_TAPS],
            weight: [0.0; MAX_TAPS],
            len: 0,
            nearest: 0,
        };

        let interior = x >= 0.0 && x <= (n - 1) as f64;
        let x0 = x.floor() as isize;
        let f = x - x0 as f64;
        match self {
            Kernel::Nearest => {
                if x < -0.5 || x >= n as f64 - 0.5 {
                    return None;
                }
                st.push((x + 0.5).floor() as isize, 1.0, n);
            }
            Kernel::Bilinear if interior => {
                st.push(x0, 1.0 - f, n);
                st.push(x0 + 1, f, n);
            }
            Kernel::Bicubic if interior => {
                for k in -1..=2 {
                    st.push(x0 + k, keys4(f - k as f64), n);
                }
            }
            Kernel::Bicubic6 if interior => {
                for k in -2..=3 {
                    st.push(x0 + k, keys6(f - k as f64), n);
                }
            }
            _ => return None,
        }
        if st.len == 0 {
            None
        } else {
            Some(st)
        }
    }
}

/// Strategy for interpolating complex samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexInterpolation {
    /// Real and imaginary parts interpolated independently
    #[default]
    Cartesian,
    /// Magnitude and phase interpolated independently, the phase relative
    /// to the nearest tap
    Polar,
}

/// Sample types that can be resampled
pub trait Interpolable: Copy + Send + Sync + Zero {
    const IS_COMPLEX: bool;

    fn nan() -> Self;
    /// `acc + self * weight`
    fn weighted_add(self, weight: f64, acc: Self) -> Self;
    /// Magnitude and phase, `None` for real samples
    fn to_polar(self) -> Option<(f64, f64)> {
        None
    }
    fn from_polar(_magnitude: f64, _phase: f64) -> Self {
        Self::nan()
    }
}

macro_rules! impl_interpolable_real {
    ($($t:ty),*) => {
        $(
            impl Interpolable for $t {
                const IS_COMPLEX: bool = false;

                fn nan() -> Self {
                    <$t>::NAN
                }
                fn weighted_add(self, weight: f64, acc: Self) -> Self {
                    acc + self * weight as $t
                }
            }
        )*
    };
}

macro_rules! impl_interpolable_complex {
    ($($t:ty),*) => {
        $(
            impl Interpolable for Complex<$t> {
                const IS_COMPLEX: bool = true;

                fn nan() -> Self {
                    Complex::new(<$t>::NAN, <$t>::NAN)
                }
                fn weighted_add(self, weight: f64, acc: Self) -> Self {
                    acc + self * weight as $t
                }
                fn to_polar(self) -> Option<(f64, f64)> {
                    Some((self.norm() as f64, self.arg() as f64))
                }
                fn from_polar(magnitude: f64, phase: f64) -> Self {
                    Complex::from_polar(magnitude as $t, phase as $t)
                }
            }
        )*
    };
}

impl_interpolable_real!(f32, f64);
impl_interpolable_complex!(f32, f64);

fn wrap_phase(phi: f64) -> f64 {
    (phi + PI).rem_euclid(2.0 * PI) - PI
}

/// Resampler configured with a kernel and a complex interpolation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resampler {
    pub kernel: Kernel,
    #[serde(default)]
    pub complex_interpolation: ComplexInterpolation,
}

impl Resampler {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            complex_interpolation: ComplexInterpolation::default(),
        }
    }

    pub fn with_complex_interpolation(mut self, mode: ComplexInterpolation) -> Self {
        self.complex_interpolation = mode;
        self
    }

    /// Value of `src` at fractional (row, col), NaN outside the valid domain
    pub fn sample<T: Interpolable>(&self, src: &ArrayView2<T>, row: f64, col: f64) -> T {
        let (rows, cols) = src.dim();
        let (sr, sc) = match (self.kernel.stencil(row, rows), self.kernel.stencil(col, cols)) {
            (Some(sr), Some(sc)) => (sr, sc),
            _ => return T::nan(),
        };

        if T::IS_COMPLEX && self.complex_interpolation == ComplexInterpolation::Polar {
            return self.sample_polar(src, &sr, &sc);
        }

        let mut acc = T::zero();
        for a in 0..sr.len {
            let row_idx = sr.index[a];
            let wr = sr.weight[a];
            for b in 0..sc.len {
                acc = src[[row_idx, sc.index[b]]].weighted_add(wr * sc.weight[b], acc);
            }
        }
        acc
    }

    fn sample_polar<T: Interpolable>(&self, src: &ArrayView2<T>, sr: &Stencil, sc: &Stencil) -> T {
        let reference = src[[sr.index[sr.nearest], sc.index[sc.nearest]]];
        let phi_ref = match reference.to_polar() {
            Some((_, phi)) => phi,
            None => return T::nan(),
        };

        let mut magnitude = 0.0;
        let mut dphi = 0.0;
        for a in 0..sr.len {
            for b in 0..sc.len {
                let w = sr.weight[a] * sc.weight[b];
                match src[[sr.index[a], sc.index[b]]].to_polar() {
                    Some((m, phi)) if m.is_finite() && phi.is_finite() => {
                        magnitude += w * m;
                        dphi += w * wrap_phase(phi - phi_ref);
                    }
                    _ => return T::nan(),
                }
            }
        }
        T::from_polar(magnitude, phi_ref + dphi)
    }

    /// Resample `src` at coordinates `(rows[i, j], cols[i, j])`; the output
    /// has the shape of the coordinate arrays.
    pub fn remap<T: Interpolable>(
        &self,
        src: &Array2<T>,
        rows: &Array2<f64>,
        cols: &Array2<f64>,
    ) -> SarResult<Array2<T>> {
        if rows.dim() != cols.dim() {
            return Err(SarError::Configuration(format!(
                "Coordinate arrays differ in shape: {:?} vs {:?}",
                rows.dim(),
                cols.dim()
            )));
        }
        log::debug!(
            "Remapping {:?} raster onto {:?} grid with {} kernel",
            src.dim(),
            rows.dim(),
            self.kernel
        );

        let view = src.view();
        let zip = Zip::from(rows).and(cols);
        #[cfg(feature = "parallel")]
        let out = zip.par_map_collect(|&r, &c| self.sample(&view, r, c));
        #[cfg(not(feature = "parallel"))]
        let out = zip.map_collect(|&r, &c| self.sample(&view, r, c));
        Ok(out)
    }

    /// Warp a secondary burst onto the primary grid with a coregistration map
    pub fn align<T: Interpolable>(&self, secondary: &Array2<T>, map: &CoregistrationMap) -> SarResult<Array2<T>> {
        self.remap(secondary, &map.azimuth, &map.range)
    }
}

/// Block-average `src` by `mlt_az` x `mlt_rg`; incomplete trailing blocks
/// are dropped and NaN samples propagate into their block.
pub fn presum<T: Interpolable>(src: &Array2<T>, mlt_az: usize, mlt_rg: usize) -> SarResult<Array2<T>> {
    if mlt_az == 0 || mlt_rg == 0 {
        return Err(SarError::Configuration(format!(
            "Presumming factors must be positive, got {}x{}",
            mlt_az, mlt_rg
        )));
    }
    let (rows, cols) = src.dim();
    let out_shape = (rows / mlt_az, cols / mlt_rg);
    let weight = 1.0 / (mlt_az * mlt_rg) as f64;

    let out = Array2::from_shape_fn(out_shape, |(i, j)| {
        let mut acc = T::zero();
        for a in i * mlt_az..(i + 1) * mlt_az {
            for b in j * mlt_rg..(j + 1) * mlt_rg {
                acc = src[[a, b]].weighted_add(weight, acc);
            }
        }
        acc
    });
    Ok(out)
}
