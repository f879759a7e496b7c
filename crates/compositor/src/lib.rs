//! Projection and weighted blending of satellite images into one
//! equirectangular cloud map.

pub mod compositor;
pub mod diagnostics;
pub mod footprint;
pub mod projector;
pub mod weight;

pub use compositor::{Composite, CompositeResult, Compositor};
pub use diagnostics::Diagnostics;
pub use projector::{
    CompositeJob, Projected, ProjectionOptions, Projector, SourceProjector, DEFAULT_POLAR_BAND,
};
pub use weight::{trust_weight, weight_raster, WEIGHT_FLOOR};
