//! Row-major `f32` rasters on the shared output grid.

use serde::{Deserialize, Serialize};

use crate::error::{CloudmapError, Result};

/// Size of the equirectangular output map shared by every source in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputGrid {
    pub width: usize,
    pub height: usize,
}

impl OutputGrid {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CloudmapError::config(format!(
                "output grid must not be empty, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longitude assigned to each output column for trust weighting:
    /// `width` evenly spaced values from -180 to 180 inclusive.
    pub fn column_longitudes(&self) -> Vec<f64> {
        if self.width == 1 {
            return vec![-180.0];
        }
        let step = 360.0 / (self.width - 1) as f64;
        (0..self.width).map(|i| -180.0 + i as f64 * step).collect()
    }
}

/// A 2-D grid of intensities (or weights), row 0 at the north edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Raster {
    /// Create a raster filled with zeros.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap existing row-major data. Returns None when the length does not
    /// match the dimensions.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn grid(&self) -> OutputGrid {
        OutputGrid {
            width: self.width,
            height: self.height,
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.data[row * self.width + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.data[row * self.width..(row + 1) * self.width]
    }

    /// Copy row `src` over row `dst`.
    pub fn copy_row(&mut self, src: usize, dst: usize) {
        if src == dst {
            return;
        }
        let w = self.width;
        self.data.copy_within(src * w..(src + 1) * w, dst * w);
    }

    pub fn same_shape(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Apply `f` to every value in place.
    pub fn map_in_place(&mut self, f: impl Fn(f32) -> f32) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// Largest finite value, or None for an empty or all-NaN raster.
    pub fn max(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f32| m.max(v))))
    }

    pub fn min(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f32| m.min(v))))
    }
}
