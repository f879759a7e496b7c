//! Sampling of source images at fractional pixel positions.
//!
//! Positions are in pixel-edge coordinates: pixel `(i, j)` covers
//! `[i, i+1) x [j, j+1)`, so its center is at `(i + 0.5, j + 0.5)`.

use serde::{Deserialize, Serialize};

/// How source pixels are sampled during resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact values).
    #[default]
    Nearest,
    /// Bilinear interpolation between the four surrounding pixel centers.
    Bilinear,
}

impl InterpolationMethod {
    /// Sample `data` at `(col, row)`; None outside the image.
    #[inline]
    pub fn sample(&self, data: &[f32], width: usize, height: usize, col: f64, row: f64) -> Option<f32> {
        match self {
            Self::Nearest => nearest(data, width, height, col, row),
            Self::Bilinear => bilinear(data, width, height, col, row),
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
        }
    }
}

/// Value of the pixel containing `(col, row)`.
pub fn nearest(data: &[f32], width: usize, height: usize, col: f64, row: f64) -> Option<f32> {
    if !(col >= 0.0 && row >= 0.0) {
        return None;
    }
    let (c, r) = (col.floor() as usize, row.floor() as usize);
    if c >= width || r >= height {
        return None;
    }
    Some(data[r * width + c])
}

/// Bilinear interpolation between pixel centers, clamped at the image edge.
pub fn bilinear(data: &[f32], width: usize, height: usize, col: f64, row: f64) -> Option<f32> {
    if !(col >= 0.0 && row >= 0.0) || col >= width as f64 || row >= height as f64 {
        return None;
    }

    let x = (col - 0.5).clamp(0.0, (width - 1) as f64);
    let y = (row - 0.5).clamp(0.0, (height - 1) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    Some(top * (1.0 - yf) + bottom * yf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest() {
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0,
            4.0, 5.0, 6.0,
            7.0, 8.0, 9.0,
        ];

        assert_eq!(nearest(&data, 3, 3, 0.0, 0.0), Some(1.0));
        assert_eq!(nearest(&data, 3, 3, 1.5, 1.5), Some(5.0));
        assert_eq!(nearest(&data, 3, 3, 2.99, 0.2), Some(3.0));
        assert_eq!(nearest(&data, 3, 3, 3.0, 0.0), None);
        assert_eq!(nearest(&data, 3, 3, -0.1, 0.0), None);
    }

    #[test]
    fn test_bilinear() {
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        // Pixel centers reproduce the data
        assert_eq!(bilinear(&data, 2, 2, 0.5, 0.5), Some(1.0));
        assert_eq!(bilinear(&data, 2, 2, 1.5, 1.5), Some(4.0));

        // Midway between all four centers
        let center = bilinear(&data, 2, 2, 1.0, 1.0).unwrap();
        assert!((center - 2.5).abs() < 0.001);

        assert_eq!(bilinear(&data, 2, 2, 2.0, 1.0), None);
    }
}
