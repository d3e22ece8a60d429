//! sardine-insar: Sentinel-1 TOPS InSAR burst processing
//!
//! DEM-assisted coregistration of primary/secondary subswath pairs, fast ESD
//! phase-jump correction, burst stitching and geocoding through lookup
//! tables.

pub mod types;
pub mod config;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, GeoTransform, OrbitData, Polarization, SarComplex, SarError, SarImage, SarRealImage,
    SarResult, StateVector,
};
pub use config::{GeocodeConfig, InsarConfig, ProductConfig};
pub use io::{DemProvider, DemTile, BurstSource, MemorySwath, SwathMetadata};
pub use pipeline::{geocode_and_merge_iw, preprocess_insar_iw, PreprocessOutput};
