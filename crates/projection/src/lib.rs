//! Map projections and resampling onto the global output grid.
//!
//! Stands in for a geospatial resampling library: the compositor only sees
//! the [`Resampler`] trait, which takes a cropped source grid with its
//! geostationary or polar stereographic area and returns the grid resampled
//! onto the Plate-Carrée target.

pub mod equirectangular;
pub mod error;
pub mod geostationary;
pub mod interpolation;
pub mod polar;
pub mod resample;

pub use equirectangular::PlateCarree;
pub use error::{ProjectionError, Result};
pub use geostationary::Geostationary;
pub use interpolation::InterpolationMethod;
pub use polar::PolarStereographic;
pub use resample::{GridResampler, Resampler, SourceArea, FILL_VALUE};
