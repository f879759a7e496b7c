//! Error types shared by the acquisition and compositing crates.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias using CloudmapError.
pub type Result<T> = std::result::Result<T, CloudmapError>;

/// Every failure a compositing run can report to its caller.
///
/// All variants are fatal for the run: either one complete composite is
/// produced or nothing is written.
#[derive(Debug, Error)]
pub enum CloudmapError {
    // === Synchronization ===
    #[error("no common timestamp for all satellites after {tries} tries (searched back to {oldest})")]
    SynchronizationExhausted {
        tries: u32,
        oldest: DateTime<Utc>,
    },

    // === Acquisition ===
    #[error("failed to acquire image for '{satellite}': {message}")]
    AcquisitionFailure { satellite: String, message: String },

    // === Projection ===
    #[error("failed to project image for '{satellite}': {message}")]
    ProjectionFailure { satellite: String, message: String },

    // === Compositing ===
    #[error("non-positive accumulated weight {weight} at row {row}, column {col}")]
    CompositeInconsistency { row: usize, col: usize, weight: f32 },

    // === Configuration / infrastructure ===
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudmapError {
    /// Create an AcquisitionFailure error.
    pub fn acquisition(satellite: impl Into<String>, message: impl ToString) -> Self {
        Self::AcquisitionFailure {
            satellite: satellite.into(),
            message: message.to_string(),
        }
    }

    /// Create a ProjectionFailure error.
    pub fn projection(satellite: impl Into<String>, message: impl ToString) -> Self {
        Self::ProjectionFailure {
            satellite: satellite.into(),
            message: message.to_string(),
        }
    }

    /// Create a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Pipeline stage that produced this error, for run reports.
    pub fn stage(&self) -> &'static str {
        match self {
            CloudmapError::SynchronizationExhausted { .. } => "synchronize",
            CloudmapError::AcquisitionFailure { .. } => "acquire",
            CloudmapError::ProjectionFailure { .. } => "project",
            CloudmapError::CompositeInconsistency { .. } => "composite",
            CloudmapError::Config(_) => "config",
            CloudmapError::Io(_) => "io",
        }
    }

    /// Name of the satellite the error is attributed to, if any.
    pub fn satellite(&self) -> Option<&str> {
        match self {
            CloudmapError::AcquisitionFailure { satellite, .. }
            | CloudmapError::ProjectionFailure { satellite, .. } => Some(satellite),
            _ => None,
        }
    }
}
