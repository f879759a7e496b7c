//! Plate-Carrée output area covering the whole globe.

use crate::error::{ProjectionError, Result};

/// Equatorial radius of the output sphere (meters).
pub const EARTH_RADIUS: f64 = 6_378_137.0;
/// Half-width of the output extent (meters).
pub const EXTENT_X: f64 = 20_037_508.34;
/// Half-height of the output extent (meters).
pub const EXTENT_Y: f64 = 10_018_754.17;

/// Global equirectangular grid of `width` x `height` pixels spanning
/// `(-EXTENT_X, -EXTENT_Y, EXTENT_X, EXTENT_Y)`, row 0 at the north.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlateCarree {
    pub width: usize,
    pub height: usize,
}

impl PlateCarree {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ProjectionError::EmptyGrid { width, height });
        }
        Ok(Self { width, height })
    }

    /// Longitude (degrees) at the center of column `col`.
    #[inline]
    pub fn pixel_lon(&self, col: usize) -> f64 {
        let pixel_w = 2.0 * EXTENT_X / self.width as f64;
        let x = -EXTENT_X + (col as f64 + 0.5) * pixel_w;
        (x / EARTH_RADIUS).to_degrees()
    }

    /// Latitude (degrees) at the center of row `row`.
    #[inline]
    pub fn pixel_lat(&self, row: usize) -> f64 {
        let pixel_h = 2.0 * EXTENT_Y / self.height as f64;
        let y = EXTENT_Y - (row as f64 + 0.5) * pixel_h;
        (y / EARTH_RADIUS).to_degrees()
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
