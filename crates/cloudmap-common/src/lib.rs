//! Common types shared across the cloudmap crates.

pub mod error;
pub mod raster;
pub mod source;
pub mod time;

pub use error::{CloudmapError, Result};
pub use raster::{OutputGrid, Raster};
pub use source::{
    validate_sources, Channel, CropLimits, Footprint, NamingScheme, Rescale, ResolutionTier,
    SourceConfig, SourceProjection, TierTable, DEFAULT_TRUST_WIDTH, GEOSTATIONARY_HEIGHT,
};
pub use time::Cadence;
