use crate::core::lut::{BurstLut, Lut};
use crate::types::{GeoTransform, SarError, SarResult};

/// Margin (lines) kept beyond the half overlap when masking burst LUTs
pub const DEFAULT_MERGE_OFFSET: usize = 4;

/// Azimuth shift placing burst position `i` (0-based) into the stitched raster
pub fn stitched_azimuth_shift(i: usize, lines_per_burst: usize, overlap: usize) -> f64 {
    let half = overlap / 2;
    (i * (lines_per_burst - 2 * half)) as f64
}

/// Merge per-burst primary LUTs into a single LUT addressing the stitched
/// raster.
///
/// Every LUT, the outer ones included, is masked to azimuths in
/// `[H - offset, naz - H + offset)` with `H = overlap / 2`, shifted to stitched line numbers and mosaicked on the
/// union of all grids, the earliest burst winning where several are valid.
pub fn merge_luts(luts: &[BurstLut], lines_per_burst: usize, overlap: usize, offset: usize) -> SarResult<Lut> {
    if luts.is_empty() {
        return Err(SarError::Configuration("No LUT to merge".to_string()));
    }
    let half = overlap / 2;
    if 2 * half > lines_per_burst {
        return Err(SarError::Configuration(format!(
            "Overlap of {} lines does not fit bursts of {} lines",
            overlap, lines_per_burst
        )));
    }

    log::info!("Merging {} burst LUTs", luts.len());
    let mut ordered: Vec<&BurstLut> = luts.iter().collect();
    ordered.sort_by_key(|b| b.burst_idx);

    let naz = lines_per_burst as f64;
    let lower = half as f64 - offset as f64;
    let upper = naz - half as f64 + offset as f64;
    let shifted: Vec<Lut> = ordered
        .iter()
        .enumerate()
        .map(|(i, burst)| {
            let mut lut = burst.lut.clone();
            lut.mask_azimuth(lower, upper);

            let shift = stitched_azimuth_shift(i, lines_per_burst, overlap);
            lut.azimuth.mapv_inplace(|az| az + shift);
            lut
        })
        .collect();

    mosaic_first_valid(&shifted)
}

/// North-up grid covering several rasters at the resolution of the first
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UnionGrid {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

impl UnionGrid {
    /// Build the union of `grids`, given as (geotransform, (rows, cols))
    pub fn new(grids: &[(&GeoTransform, (usize, usize))]) -> SarResult<Self> {
        let (first, _) = grids
            .first()
            .ok_or_else(|| SarError::Configuration("No raster to merge".to_string()))?;
        let pw = first.pixel_width;
        let ph = first.pixel_height;

        let mut left = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        let mut top = f64::NEG_INFINITY;
        let mut bottom = f64::INFINITY;
        for (gt, (rows, cols)) in grids {
            if !gt.is_north_up() || gt.pixel_width <= 0.0 || gt.pixel_height >= 0.0 {
                return Err(SarError::Configuration(
                    "Only north-up grids can be merged".to_string(),
                ));
            }
            if ((gt.pixel_width - pw) / pw).abs() > 1e-6 || ((gt.pixel_height - ph) / ph).abs() > 1e-6 {
                return Err(SarError::Configuration(format!(
                    "Grid resolutions differ: {}x{} vs {}x{}",
                    gt.pixel_width, gt.pixel_height, pw, ph
                )));
            }
            left = left.min(gt.top_left_x);
            right = right.max(gt.top_left_x + *cols as f64 * gt.pixel_width);
            top = top.max(gt.top_left_y);
            bottom = bottom.min(gt.top_left_y + *rows as f64 * gt.pixel_height);
        }

        Ok(Self {
            transform: GeoTransform::north_up(left, top, pw, ph),
            rows: ((bottom - top) / ph).round() as usize,
            cols: ((right - left) / pw).round() as usize,
        })
    }

    /// Whole-pixel (row, col) offset of a member grid
    pub fn offset(&self, gt: &GeoTransform) -> (usize, usize) {
        let row = ((gt.top_left_y - self.transform.top_left_y) / self.transform.pixel_height).round();
        let col = ((gt.top_left_x - self.transform.top_left_x) / self.transform.pixel_width).round();
        (row.max(0.0) as usize, col.max(0.0) as usize)
    }
}

/// Mosaic LUTs on the union of their grids at the resolution of the first
/// one. Grid offsets are rounded to whole pixels; the first valid value wins.
pub fn mosaic_first_valid(luts: &[Lut]) -> SarResult<Lut> {
    let grids: Vec<(&GeoTransform, (usize, usize))> = luts.iter().map(|l| (&l.transform, l.dim())).collect();
    let grid = UnionGrid::new(&grids)?;
    let crs = luts.first().map(|l| l.crs.clone()).unwrap_or_default();
    if luts.iter().any(|l| l.crs != crs) {
        log::warn!("Merging LUTs with different CRS definitions");
    }
    let (rows, cols) = (grid.rows, grid.cols);
    let mut merged = Lut::empty((rows, cols), grid.transform.clone(), crs);

    for lut in luts {
        let (row_off, col_off) = grid.offset(&lut.transform);
        for ((i, j), &az) in lut.azimuth.indexed_iter() {
            let rg = lut.range[[i, j]];
            if !(az.is_finite() && rg.is_finite()) {
                continue;
            }
            let (r, c) = (i + row_off, j + col_off);
            if r >= rows || c >= cols {
                continue;
            }
            if merged.azimuth[[r, c]].is_nan() {
                merged.azimuth[[r, c]] = az;
                merged.range[[r, c]] = rg;
            }
        }
    }

    log::debug!(
        "Merged LUT: {}x{} cells, {} resolved",
        rows,
        cols,
        merged.valid_count()
    );
    Ok(merged)
}
