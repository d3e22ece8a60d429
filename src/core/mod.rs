//! Core InSAR processing modules

pub mod geometry;
pub mod orbit;
pub mod range_doppler;
pub mod tops;
pub mod lut;
pub mod geocode;
pub mod coregister;
pub mod resample;
pub mod burst_processor;
pub mod esd;
pub mod stitch;
pub mod lut_merge;
pub mod interferometry;
pub mod sar2geo;
pub mod products;

// Re-export main types
pub use orbit::{OrbitInterpolator, DEFAULT_LAGRANGE_POINTS};
pub use range_doppler::{RangeDopplerSolver, SolverParams, ZeroDopplerSolution};
pub use tops::{deramp_phase, topographic_phase, RangePhaseModel};
pub use lut::{BurstLut, Lut};
pub use geocode::{BurstGeocoder, BurstGeometry};
pub use coregister::{coregister, CoregistrationMap};
pub use resample::{presum, ComplexInterpolation, Interpolable, Kernel, Resampler};
pub use burst_processor::{BurstAccumulator, BurstProcessingParams, BurstProcessor, ProcessedBursts};
pub use esd::{apply_fast_esd, esd_ramp, estimate_seam_phases};
pub use stitch::{stitch_bursts, stitched_height};
pub use lut_merge::{merge_luts, DEFAULT_MERGE_OFFSET};
pub use interferometry::{amplitude, coherence, interferogram, Coherence, CoherenceParams, CoherenceProducts};
pub use sar2geo::{geocode_raster, GeocodedRaster, RadarRaster};
pub use products::{compute_products, geocode_products, mosaic_geocoded, GeocodedProduct, ProductKind, RadarProduct};
