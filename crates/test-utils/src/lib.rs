//! Shared test utilities for the cloudmap workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Temporary directory helpers
//! - Synthetic raster and image generators
//! - Satellite source fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{dundee_source, encode_png};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of two rasters (or any `&[f32]`).
///
/// ```ignore
/// use test_utils::assert_slices_approx_eq;
///
/// assert_slices_approx_eq!(&[1.0, 2.0], &[1.0, 2.00001], 1e-3);
/// ```
#[macro_export]
macro_rules! assert_slices_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[f32] = $left;
        let right: &[f32] = $right;
        assert_eq!(left.len(), right.len(), "slice lengths differ");
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            let diff = (*l as f64 - *r as f64).abs();
            if diff > $epsilon as f64 {
                panic!(
                    "assertion failed at index {}: `{:?}` vs `{:?}` (diff {:?})",
                    i, l, r, diff
                );
            }
        }
    }};
}
