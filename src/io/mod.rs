//! Swath access, DEM tiles and raster files

pub mod dem;
pub mod swath;
#[cfg(feature = "gdal")]
pub mod raster;

pub use dem::{DemProvider, DemTile, InMemoryDem};
#[cfg(feature = "gdal")]
pub use dem::GdalDemProvider;
pub use swath::{BurstMetadata, BurstSource, MemorySwath, SwathMetadata};
