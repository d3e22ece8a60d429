//! Subswath InSAR pre-processing: coregistration, ESD, stitching and LUT
//! merging of a primary/secondary pair

use crate::config::{InsarConfig, ProductConfig};
use crate::core::burst_processor::BurstProcessor;
use crate::core::esd::apply_fast_esd;
use crate::core::lut::{BurstLut, Lut};
use crate::core::lut_merge::merge_luts;
use crate::core::products::{compute_products, geocode_products, mosaic_geocoded, GeocodedProduct, ProductKind};
use crate::core::stitch::stitch_bursts;
use crate::io::dem::DemProvider;
use crate::io::swath::BurstSource;
use crate::types::{SarError, SarImage, SarResult};
use std::ops::RangeInclusive;

/// Coregistered pair in the stitched primary radar geometry
#[derive(Debug)]
pub struct PreprocessOutput {
    pub primary: SarImage,
    pub secondary: SarImage,
    /// LUT from the geographic DEM grid into the stitched primary raster
    pub lut: Lut,
    pub burst_luts: Vec<BurstLut>,
    pub bursts: RangeInclusive<usize>,
    /// Burst overlap in lines
    pub overlap: usize,
    /// Phase jump estimated at each seam, when ESD ran
    pub seam_phase_jumps: Vec<Option<f64>>,
}

#[cfg(feature = "gdal")]
impl PreprocessOutput {
    /// Write `primary.tif`, `secondary.tif` and `lut.tif` into `dir`
    pub fn write_geotiffs<P: AsRef<std::path::Path>>(&self, dir: P) -> SarResult<()> {
        use crate::io::raster::{write_complex, write_lut};
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        write_complex(dir.join("primary.tif"), &self.primary)?;
        write_complex(dir.join("secondary.tif"), &self.secondary)?;
        write_lut(dir.join("lut.tif"), &self.lut)?;
        Ok(())
    }
}

/// Coregister a secondary subswath onto a primary subswath.
///
/// Both swaths must list the same burst IDs. Bursts are coregistered with the
/// DEM, phase jumps between bursts are optionally removed, and the bursts
/// are stitched into continuous rasters along with a LUT to geocode them.
pub fn preprocess_insar_iw(
    primary: &dyn BurstSource,
    secondary: &dyn BurstSource,
    dem: &dyn DemProvider,
    config: &InsarConfig,
) -> SarResult<PreprocessOutput> {
    config.validate()?;
    let meta_p = primary.metadata();
    let meta_s = secondary.metadata();

    if meta_p.burst_ids() != meta_s.burst_ids() {
        return Err(SarError::Configuration(
            "Products must have identical lists of burst IDs".to_string(),
        ));
    }

    let overlap = meta_p.uniform_overlap()?;
    let bursts = config.burst_range(meta_p.burst_count())?;
    let burst_count = bursts.end() - bursts.start() + 1;
    let lines = meta_p.lines_per_burst;

    log::info!(
        "Pre-processing {} {} bursts {}..={} (overlap {} lines)",
        meta_p.swath,
        meta_p.polarization,
        bursts.start(),
        bursts.end(),
        overlap
    );

    let processor = BurstProcessor::new(primary, secondary, dem, config.processing_params())?;
    let processed = processor.process(bursts.clone())?;
    let acc_p = processed.primary;
    let mut acc_s = processed.secondary;

    let seam_phase_jumps = if burst_count > 1 && config.apply_fast_esd {
        apply_fast_esd(&acc_p, &mut acc_s, overlap)?
    } else {
        Vec::new()
    };

    let (primary_img, secondary_img) = if burst_count > 1 {
        let mut stitched_s = stitch_bursts(&[acc_s.data().view()], lines, burst_count, overlap, 1)?;
        let mut stitched_p = stitch_bursts(&[acc_p.data().view()], lines, burst_count, overlap, 1)?;
        match (stitched_p.pop(), stitched_s.pop()) {
            (Some(p), Some(s)) => (p, s),
            _ => return Err(SarError::Processing("Stitching produced no raster".to_string())),
        }
    } else {
        (acc_p.into_data(), acc_s.into_data())
    };

    let lut = merge_luts(&processed.luts, lines, overlap, config.lut_merge_offset)?;

    log::info!(
        "Done: {}x{} coregistered rasters, {}x{} LUT",
        primary_img.nrows(),
        primary_img.ncols(),
        lut.dim().0,
        lut.dim().1
    );

    Ok(PreprocessOutput {
        primary: primary_img,
        secondary: secondary_img,
        lut,
        burst_luts: processed.luts,
        bursts,
        overlap,
        seam_phase_jumps,
    })
}

/// Geocode the products of one or more pre-processed subswaths and mosaic
/// them per product.
///
/// Products are computed in each subswath's radar geometry and geocoded
/// with its LUT. Where subswaths overlap, the first one listed wins.
pub fn geocode_and_merge_iw(swaths: &[PreprocessOutput], config: &ProductConfig) -> SarResult<Vec<GeocodedProduct>> {
    config.validate()?;
    if swaths.is_empty() {
        return Err(SarError::Configuration("No subswath to geocode".to_string()));
    }

    let mut per_swath = Vec::with_capacity(swaths.len());
    for (i, swath) in swaths.iter().enumerate() {
        log::info!("Computing products of subswath {}/{}", i + 1, swaths.len());
        let products = compute_products(&swath.primary, &swath.secondary, config)?;
        per_swath.push(geocode_products(&products, &swath.lut, config)?);
    }

    let kinds: Vec<ProductKind> = per_swath[0].iter().map(|p| p.kind).collect();
    kinds
        .into_iter()
        .map(|kind| {
            let rasters: Vec<_> = per_swath
                .iter_mut()
                .filter_map(|products| {
                    let idx = products.iter().position(|p| p.kind == kind)?;
                    Some(products.swap_remove(idx).raster)
                })
                .collect();
            log::info!("Merging {} from {} subswaths", kind.name(), rasters.len());
            Ok(GeocodedProduct {
                kind,
                raster: mosaic_geocoded(&rasters)?,
            })
        })
        .collect()
}
