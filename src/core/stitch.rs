use crate::types::{SarError, SarResult};
use ndarray::{s, Array2, ArrayView2};

/// Height of a stitched raster built from `burst_count` bursts
pub fn stitched_height(lines_per_burst: usize, burst_count: usize, overlap: usize) -> SarResult<usize> {
    let half = overlap / 2;
    if 2 * half > lines_per_burst {
        return Err(SarError::Configuration(format!(
            "Overlap of {} lines does not fit bursts of {} lines",
            overlap, lines_per_burst
        )));
    }
    match burst_count {
        0 => Err(SarError::Configuration("Empty burst list".to_string())),
        1 => Ok(lines_per_burst - half),
        n => Ok(2 * (lines_per_burst - half) + (n - 2) * (lines_per_burst - 2 * half)),
    }
}

/// Source line range kept from burst position `i` (0-based) among `burst_count`
fn kept_lines(i: usize, burst_count: usize, lines_per_burst: usize, half: usize) -> (usize, usize) {
    if i == 0 {
        (0, lines_per_burst - half)
    } else if i == burst_count - 1 {
        (half, lines_per_burst)
    } else {
        (half, lines_per_burst - half)
    }
}

/// Stitch stacked bursts into a continuous raster, dropping half of each
/// overlap on both sides of every seam.
///
/// Each band holds bursts of `lines_per_burst` lines stacked along azimuth;
/// the `burst_count` bursts starting at burst `off_burst` (1-based) are
/// stitched. Every band is stitched the same way.
pub fn stitch_bursts<T: Clone>(
    bands: &[ArrayView2<'_, T>],
    lines_per_burst: usize,
    burst_count: usize,
    overlap: usize,
    off_burst: usize,
) -> SarResult<Vec<Array2<T>>> {
    let height = stitched_height(lines_per_burst, burst_count, overlap)?;
    if off_burst == 0 {
        return Err(SarError::Configuration("Burst offset is 1-based".to_string()));
    }
    let half = overlap / 2;
    let first_line = (off_burst - 1) * lines_per_burst;

    log::info!("Stitching {} bursts to make a continuous image", burst_count);
    bands
        .iter()
        .map(|band| {
            let needed = first_line + burst_count * lines_per_burst;
            if band.nrows() < needed {
                return Err(SarError::Configuration(format!(
                    "Raster has {} lines, {} needed to stitch bursts {}..={}",
                    band.nrows(),
                    needed,
                    off_burst,
                    off_burst + burst_count - 1
                )));
            }

            let mut pieces = Vec::with_capacity(burst_count);
            for i in 0..burst_count {
                let (start, end) = kept_lines(i, burst_count, lines_per_burst, half);
                let base = first_line + i * lines_per_burst;
                pieces.push(band.slice(s![base + start..base + end, ..]));
            }
            let stitched = ndarray::concatenate(ndarray::Axis(0), &pieces)
                .map_err(|e| SarError::Processing(format!("Failed to stitch bursts: {}", e)))?;
            debug_assert_eq!(stitched.nrows(), height);
            Ok(stitched)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacked(lines: usize, bursts: usize) -> Array2<i32> {
        Array2::from_shape_fn((lines * bursts, 2), |(i, j)| (i * 10 + j) as i32)
    }

    #[test]
    fn test_heights() {
        assert_eq!(stitched_height(100, 2, 20).unwrap(), 180);
        assert_eq!(stitched_height(100, 3, 20).unwrap(), 260);
        assert_eq!(stitched_height(100, 1, 20).unwrap(), 90);
        assert_eq!(stitched_height(100, 4, 21).unwrap(), 4 * 100 - 3 * 20);
        assert!(stitched_height(100, 0, 20).is_err());
    }

    #[test]
    fn test_stitch_keeps_expected_lines() {
        let raster = stacked(10, 3);
        let out = stitch_bursts(&[raster.view()], 10, 3, 4, 1).unwrap();
        let band = &out[0];
        assert_eq!(band.nrows(), 2 * 8 + 6);
        // burst 1 lines 0..8, burst 2 lines 2..8, burst 3 lines 2..10
        assert_eq!(band[[0, 0]], 0);
        assert_eq!(band[[7, 0]], 70);
        assert_eq!(band[[8, 0]], 120);
        assert_eq!(band[[13, 1]], 171);
        assert_eq!(band[[14, 0]], 220);
        assert_eq!(band[[21, 0]], 290);
    }

    #[test]
    fn test_stitch_with_offset_and_bands() {
        let a = stacked(10, 3);
        let b = a.mapv(|v| -v);
        let out = stitch_bursts(&[a.view(), b.view()], 10, 2, 4, 2).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].nrows(), 16);
        assert_eq!(out[0][[0, 0]], 100);
        assert_eq!(out[1][[0, 0]], -100);
        assert_eq!(out[0][[15, 0]], 290);

        assert!(stitch_bursts(&[a.view()], 10, 3, 4, 2).is_err());
        assert!(stitch_bursts::<i32>(&[], 10, 0, 4, 1).is_err());
    }
}
