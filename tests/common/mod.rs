//! Synthetic scenes shared by the integration tests

#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use ndarray::Array2;
use sardine_insar::core::geocode::BurstGeocoder;
use sardine_insar::core::orbit::{OrbitInterpolator, DEFAULT_LAGRANGE_POINTS};
use sardine_insar::io::swath::{BurstMetadata, RangePolynomial, TopsDerampParams};
use sardine_insar::types::SPEED_OF_LIGHT;
use sardine_insar::{
    BoundingBox, DemTile, GeoTransform, MemorySwath, OrbitData, Polarization, SarComplex, StateVector,
    SwathMetadata,
};

pub const AZIMUTH_TIME_INTERVAL: f64 = 0.002;
pub const NEAR_RANGE: f64 = 800_000.0;
pub const RANGE_SPACING: f64 = 15.0;
pub const DEM_SPACING: f64 = 0.00015;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Straight northward orbit 700 km above the equator at longitude 0,
/// looking east. Bursts start 5 s after the orbit reference time.
pub fn synthetic_swath(lines_per_burst: usize, samples: usize, bursts: usize, overlap: usize) -> SwathMetadata {
    let t_ref = Utc.with_ymd_and_hms(2023, 9, 4, 6, 37, 0).unwrap();
    let state_vectors = (0..20)
        .map(|k| StateVector {
            time: t_ref + Duration::seconds(k),
            position: [6_378_137.0 + 700_000.0, 0.0, 7_500.0 * (k as f64 - 5.0)],
            velocity: [0.0, 0.0, 7_500.0],
        })
        .collect();

    let cycle_us = ((lines_per_burst - overlap) as f64 * AZIMUTH_TIME_INTERVAL * 1e6).round() as i64;
    let burst_start = t_ref + Duration::seconds(5);
    let burst_list = (0..bursts)
        .map(|b| BurstMetadata {
            burst_id: 250_000 + b as u32,
            azimuth_time: burst_start + Duration::microseconds(cycle_us * b as i64),
            footprint: BoundingBox { min_lon: 0.0, max_lon: 0.0, min_lat: 0.0, max_lat: 0.0 },
            first_valid_sample: vec![0; lines_per_burst],
            last_valid_sample: vec![samples as i32 - 1; lines_per_burst],
            deramp: TopsDerampParams {
                azimuth_steering_rate: 0.0275,
                azimuth_fm_rate: RangePolynomial::constant(-2200.0),
                doppler_centroid: RangePolynomial::constant(10.0),
            },
        })
        .collect();

    let mut meta = SwathMetadata {
        product_id: "S1A_SYNTHETIC".to_string(),
        swath: "IW1".to_string(),
        polarization: Polarization::VV,
        lines_per_burst,
        samples_per_burst: samples,
        azimuth_time_interval: AZIMUTH_TIME_INTERVAL,
        slant_range_time: 2.0 * NEAR_RANGE / SPEED_OF_LIGHT,
        range_sampling_rate: SPEED_OF_LIGHT / (2.0 * RANGE_SPACING),
        wavelength: 0.055465,
        orbit: OrbitData { state_vectors, reference_time: t_ref },
        bursts: burst_list,
    };

    set_footprints(&mut meta);
    meta
}

/// Footprints at sea level from the burst corners
pub fn set_footprints(meta: &mut SwathMetadata) {
    let orbit = OrbitInterpolator::new(&meta.orbit, DEFAULT_LAGRANGE_POINTS).unwrap();
    let footprints: Vec<BoundingBox> = {
        let geocoder = BurstGeocoder::new(meta, &orbit);
        (1..=meta.burst_count())
            .map(|b| geocoder.burst_footprint(b, 0.0).unwrap().expect("burst corners on the ellipsoid"))
            .collect()
    };
    for (burst, footprint) in meta.bursts.iter_mut().zip(footprints) {
        burst.footprint = footprint;
    }
}

/// Same orbit and burst IDs, with every burst starting `lines` lines later
/// and the near range `samples` samples farther
pub fn shifted_swath(meta: &SwathMetadata, lines: usize, samples: usize) -> SwathMetadata {
    let mut shifted = meta.clone();
    let delay_us = (lines as f64 * AZIMUTH_TIME_INTERVAL * 1e6).round() as i64;
    for burst in shifted.bursts.iter_mut() {
        burst.azimuth_time = burst.azimuth_time + Duration::microseconds(delay_us);
    }
    shifted.slant_range_time += 2.0 * samples as f64 * RANGE_SPACING / SPEED_OF_LIGHT;
    set_footprints(&mut shifted);
    shifted
}

/// Bursts of `data` seen from a geometry shifted by (`lines`, `samples`):
/// sample (l, j) of each burst is sample (l + lines, j + samples) of the
/// unshifted burst, and positions past the burst edges get fresh speckle.
pub fn shifted_bursts(data: &Array2<SarComplex>, lines_per_burst: usize, lines: usize, samples: usize) -> Array2<SarComplex> {
    let (rows, cols) = data.dim();
    let filler = speckle(rows, cols, 99);
    Array2::from_shape_fn((rows, cols), |(r, j)| {
        let (b, l) = (r / lines_per_burst, r % lines_per_burst);
        if l + lines < lines_per_burst && j + samples < cols {
            data[[b * lines_per_burst + l + lines, j + samples]]
        } else {
            filler[[r, j]]
        }
    })
}


/// Deterministic pseudo-random speckle
pub fn speckle(rows: usize, cols: usize, seed: u64) -> Array2<SarComplex> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
    let mut next = move || {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        ((state >> 33) as f64 / (1u64 << 31) as f64) as f32
    };
    Array2::from_shape_fn((rows, cols), |_| {
        let amplitude = 0.5 + next();
        let phase = (next() - 0.5) * 2.0 * std::f32::consts::PI;
        SarComplex::from_polar(amplitude, phase)
    })
}

pub fn memory_swath(meta: SwathMetadata, seed: u64) -> MemorySwath {
    let rows = meta.lines_per_burst * meta.burst_count();
    let data = speckle(rows, meta.samples_per_burst, seed);
    MemorySwath::new(meta, data).unwrap()
}

/// Flat DEM at sea level covering every burst footprint, on a grid snapped
/// to multiples of its spacing
pub fn flat_dem(meta: &SwathMetadata, spacing: f64) -> DemTile {
    let corners: Vec<(f64, f64)> = meta
        .bursts
        .iter()
        .flat_map(|b| {
            let f = &b.footprint;
            vec![(f.min_lon, f.min_lat), (f.max_lon, f.max_lat)]
        })
        .collect();
    let bbox = BoundingBox::from_points(&corners).unwrap().buffered(0.005);
    let x0 = (bbox.min_lon / spacing).floor() * spacing;
    let y0 = (bbox.max_lat / spacing).ceil() * spacing;
    let cols = ((bbox.max_lon - x0) / spacing).ceil() as usize;
    let rows = ((y0 - bbox.min_lat) / spacing).ceil() as usize;
    DemTile {
        elevation: Array2::zeros((rows, cols)),
        transform: GeoTransform::north_up(x0, y0, spacing, -spacing),
        crs: "EPSG:4326".to_string(),
        nodata: Some(-32768.0),
    }
}
