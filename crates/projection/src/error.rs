//! Error types for resampling.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProjectionError>;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("grid must not be empty, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },

    #[error("data length {actual} does not match {width}x{height} grid")]
    DimensionMismatch {
        width: usize,
        height: usize,
        actual: usize,
    },

    #[error("invalid projection parameters: {0}")]
    InvalidParameters(String),
}
