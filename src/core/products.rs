//! Interferometric products in radar geometry, their geocoding and the
//! mosaic of geocoded rasters across subswaths

use crate::config::ProductConfig;
use crate::core::interferometry::{amplitude, coherence, interferogram, CoherenceParams};
use crate::core::lut::Lut;
use crate::core::lut_merge::UnionGrid;
use crate::core::sar2geo::{geocode_raster, GeocodedRaster, RadarRaster};
use crate::types::{GeoTransform, SarError, SarImage, SarRealImage, SarResult};
use ndarray::Array2;

/// Product derived from a coregistered pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductKind {
    Coherence,
    /// Interferogram, geocoded as its phase
    Phase,
    PrimaryAmplitude,
    SecondaryAmplitude,
}

impl ProductKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProductKind::Coherence => "coh",
            ProductKind::Phase => "phi",
            ProductKind::PrimaryAmplitude => "prm_ampl",
            ProductKind::SecondaryAmplitude => "sec_ampl",
        }
    }

    pub fn is_phase(&self) -> bool {
        matches!(self, ProductKind::Phase)
    }
}

/// Product in the stitched primary radar geometry
#[derive(Debug, Clone)]
pub struct RadarProduct {
    pub kind: ProductKind,
    pub raster: RadarRaster,
}

/// Product on a geographic grid
#[derive(Debug, Clone)]
pub struct GeocodedProduct {
    pub kind: ProductKind,
    pub raster: GeocodedRaster,
}

/// Compute the requested products of a coregistered pair, in the order
/// coherence, phase, primary amplitude, secondary amplitude.
pub fn compute_products(primary: &SarImage, secondary: &SarImage, config: &ProductConfig) -> SarResult<Vec<RadarProduct>> {
    config.validate()?;
    let mut products = Vec::new();

    if config.write_coherence {
        let params = CoherenceParams {
            box_azimuth: config.boxcar_azimuth,
            box_range: config.boxcar_range,
            magnitude: true,
            with_interferogram: config.write_interferogram,
        };
        let out = coherence(primary, secondary, &params)?;
        products.push(RadarProduct {
            kind: ProductKind::Coherence,
            raster: RadarRaster::Real(out.coherence.magnitude()),
        });
        if let Some(ifg) = out.interferogram {
            products.push(RadarProduct {
                kind: ProductKind::Phase,
                raster: RadarRaster::Complex(ifg),
            });
        }
    } else {
        products.push(RadarProduct {
            kind: ProductKind::Phase,
            raster: RadarRaster::Complex(interferogram(primary, secondary)?),
        });
    }

    if config.write_primary_amplitude {
        products.push(RadarProduct {
            kind: ProductKind::PrimaryAmplitude,
            raster: RadarRaster::Real(amplitude(primary)),
        });
    }
    if config.write_secondary_amplitude {
        products.push(RadarProduct {
            kind: ProductKind::SecondaryAmplitude,
            raster: RadarRaster::Real(amplitude(secondary)),
        });
    }
    Ok(products)
}

/// Geocode products with a LUT. The interferogram is written as its phase
/// with `kernel_phase`; other products use `kernel`.
pub fn geocode_products(products: &[RadarProduct], lut: &Lut, config: &ProductConfig) -> SarResult<Vec<GeocodedProduct>> {
    products
        .iter()
        .map(|p| {
            log::info!("Geocoding {}", p.kind.name());
            let geo = config.geocode_config(p.kind.is_phase());
            Ok(GeocodedProduct {
                kind: p.kind,
                raster: geocode_raster(&p.raster, lut, &geo)?,
            })
        })
        .collect()
}

fn real_band(raster: &GeocodedRaster) -> SarResult<&SarRealImage> {
    match &raster.data {
        RadarRaster::Real(a) => Ok(a),
        RadarRaster::Complex(_) => Err(SarError::Configuration(
            "Trying to merge complex rasters, geocode them as phase or magnitude first".to_string(),
        )),
    }
}

/// Mosaic real geocoded rasters on the union of their grids, at the
/// resolution of the first one. Cells that are NaN or equal to a raster's
/// nodata value are skipped; the first valid value wins. The result keeps
/// the nodata marker of the first raster.
pub fn mosaic_geocoded(rasters: &[GeocodedRaster]) -> SarResult<GeocodedRaster> {
    let first = rasters
        .first()
        .ok_or_else(|| SarError::Configuration("No raster to merge".to_string()))?;
    let bands = rasters.iter().map(real_band).collect::<SarResult<Vec<_>>>()?;
    let grids: Vec<(&GeoTransform, (usize, usize))> = rasters
        .iter()
        .zip(&bands)
        .map(|(r, b)| (&r.transform, b.dim()))
        .collect();
    let grid = UnionGrid::new(&grids)?;

    if rasters.iter().any(|r| r.crs != first.crs) {
        log::warn!("Merging rasters with different CRS definitions");
    }
    let fill = first.nodata.unwrap_or(f32::NAN);
    let mut merged = Array2::<f32>::from_elem((grid.rows, grid.cols), fill);
    let mut filled = Array2::<bool>::from_elem((grid.rows, grid.cols), false);

    for (raster, band) in rasters.iter().zip(&bands) {
        let (row_off, col_off) = grid.offset(&raster.transform);
        for ((i, j), &v) in band.indexed_iter() {
            if v.is_nan() || raster.nodata == Some(v) {
                continue;
            }
            let (r, c) = (i + row_off, j + col_off);
            if r >= grid.rows || c >= grid.cols || filled[[r, c]] {
                continue;
            }
            merged[[r, c]] = v;
            filled[[r, c]] = true;
        }
    }

    log::debug!("Merged {} rasters on a {}x{} grid", rasters.len(), grid.rows, grid.cols);
    Ok(GeocodedRaster {
        data: RadarRaster::Real(merged),
        transform: grid.transform,
        crs: first.crs.clone(),
        nodata: first.nodata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resample::Kernel;
    use crate::core::sar2geo::PHASE_NODATA;
    use crate::types::SarComplex;
    use approx::assert_abs_diff_eq;

    fn pair() -> (SarImage, SarImage) {
        let p = Array2::from_shape_fn((6, 12), |(i, j)| SarComplex::from_polar(1.0 + (i + j) as f32 * 0.1, 0.05 * j as f32));
        let s = p.mapv(|v| v * SarComplex::from_polar(1.0, -0.4));
        (p, s)
    }

    fn single_look() -> ProductConfig {
        ProductConfig {
            multilook_range: 1,
            ..ProductConfig::default()
        }
    }

    fn raster(values: Vec<f32>, cols: usize, x0: f64, nodata: Option<f32>) -> GeocodedRaster {
        let rows = values.len() / cols;
        GeocodedRaster {
            data: RadarRaster::Real(Array2::from_shape_vec((rows, cols), values).unwrap()),
            transform: GeoTransform::north_up(x0, 45.0, 0.5, -0.5),
            crs: "EPSG:4326".to_string(),
            nodata,
        }
    }

    fn band(raster: &GeocodedRaster) -> &SarRealImage {
        match &raster.data {
            RadarRaster::Real(a) => a,
            RadarRaster::Complex(_) => panic!("expected a real raster"),
        }
    }

    #[test]
    fn test_default_products() {
        let (p, s) = pair();
        let products = compute_products(&p, &s, &ProductConfig::default()).unwrap();
        let kinds: Vec<_> = products.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProductKind::Coherence, ProductKind::Phase, ProductKind::PrimaryAmplitude]);

        match &products[0].raster {
            RadarRaster::Real(coh) => assert_abs_diff_eq!(coh[[3, 6]], 1.0, epsilon = 1e-4),
            RadarRaster::Complex(_) => panic!("coherence should be a magnitude"),
        }
        match &products[1].raster {
            RadarRaster::Complex(ifg) => assert_abs_diff_eq!(ifg[[2, 5]].arg(), 0.4, epsilon = 1e-5),
            RadarRaster::Real(_) => panic!("interferogram should stay complex"),
        }
        match &products[2].raster {
            RadarRaster::Real(a) => assert_abs_diff_eq!(a[[1, 2]], 1.3, epsilon = 1e-5),
            RadarRaster::Complex(_) => panic!("amplitude should be real"),
        }
    }

    #[test]
    fn test_interferogram_only_with_secondary_amplitude() {
        let (p, s) = pair();
        let config = ProductConfig {
            write_coherence: false,
            write_primary_amplitude: false,
            write_secondary_amplitude: true,
            ..ProductConfig::default()
        };
        let products = compute_products(&p, &s, &config).unwrap();
        let kinds: Vec<_> = products.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProductKind::Phase, ProductKind::SecondaryAmplitude]);
        assert!(products[0].raster.is_complex());

        let none = ProductConfig {
            write_coherence: false,
            write_interferogram: false,
            ..ProductConfig::default()
        };
        assert!(matches!(compute_products(&p, &s, &none), Err(SarError::Configuration(_))));
    }

    #[test]
    fn test_phase_geocoded_with_phase_kernel() {
        let (p, s) = pair();
        let config = ProductConfig {
            kernel: Kernel::Bicubic,
            kernel_phase: Kernel::Nearest,
            ..single_look()
        };
        let products = compute_products(&p, &s, &config).unwrap();
        // half-pixel positions: nearest picks a sample, bicubic would blend
        let lut = Lut::new(
            Array2::from_shape_vec((1, 3), vec![2.0, 3.4, f64::NAN]).unwrap(),
            Array2::from_shape_vec((1, 3), vec![5.0, 7.4, 1.0]).unwrap(),
            GeoTransform::north_up(10.0, 45.0, 0.001, -0.001),
            "EPSG:4326".to_string(),
        )
        .unwrap();
        let geocoded = geocode_products(&products, &lut, &config).unwrap();
        assert_eq!(geocoded.len(), 3);

        let phase = &geocoded[1];
        assert_eq!(phase.kind, ProductKind::Phase);
        assert_eq!(phase.raster.nodata, Some(PHASE_NODATA));
        let phi = band(&phase.raster);
        assert_abs_diff_eq!(phi[[0, 0]], 0.4, epsilon = 1e-5);
        assert_abs_diff_eq!(phi[[0, 1]], 0.4, epsilon = 1e-5);
        assert_eq!(phi[[0, 2]], PHASE_NODATA);

        let amp = band(&geocoded[2].raster);
        assert_eq!(geocoded[2].raster.nodata, None);
        assert_abs_diff_eq!(amp[[0, 0]], 1.7, epsilon = 1e-4);
        assert!(amp[[0, 2]].is_nan());
    }

    #[test]
    fn test_mosaic_first_valid_skips_nodata() {
        let a = raster(vec![1.0, PHASE_NODATA, 3.0, 4.0], 2, 0.0, Some(PHASE_NODATA));
        let b = raster(vec![10.0, 20.0, f32::NAN, 40.0], 2, 0.5, None);
        let merged = mosaic_geocoded(&[a, b]).unwrap();
        let m = band(&merged);
        assert_eq!(m.dim(), (2, 3));
        assert_eq!(merged.nodata, Some(PHASE_NODATA));
        assert_eq!(merged.transform.top_left_x, 0.0);
        // row 0: a[0], b[0] under a's nodata, b[1]
        assert_eq!(m.row(0).to_vec(), vec![1.0, 10.0, 20.0]);
        // row 1: a wins where both are valid, the NaN of b leaves nodata
        assert_eq!(m.row(1).to_vec(), vec![3.0, 4.0, 40.0]);

        let c = raster(vec![f32::NAN, 5.0], 1, 0.0, None);
        let d = raster(vec![7.0, 8.0], 1, 0.0, None);
        let merged = mosaic_geocoded(&[c, d]).unwrap();
        assert_eq!(band(&merged).column(0).to_vec(), vec![7.0, 5.0]);
    }

    #[test]
    fn test_complex_rasters_not_merged() {
        let a = raster(vec![1.0, 2.0], 2, 0.0, None);
        let b = GeocodedRaster {
            data: RadarRaster::Complex(Array2::from_elem((1, 2), SarComplex::new(1.0, 1.0))),
            ..raster(vec![0.0, 0.0], 2, 1.0, None)
        };
        assert!(matches!(mosaic_geocoded(&[a, b]), Err(SarError::Configuration(_))));
        assert!(mosaic_geocoded(&[]).is_err());
    }

    #[test]
    fn test_mosaic_rejects_resolution_mismatch() {
        let a = raster(vec![1.0, 2.0], 2, 0.0, None);
        let mut b = raster(vec![1.0, 2.0], 2, 1.0, None);
        b.transform.pixel_width = 0.25;
        assert!(mosaic_geocoded(&[a, b]).is_err());
    }
}
