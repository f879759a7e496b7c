//! Synthetic raster and image generators.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};

use cloudmap_common::{OutputGrid, Raster};

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// A raster on `grid` filled with `value`.
pub fn constant_raster(grid: OutputGrid, value: f32) -> Raster {
    Raster::filled(grid.width, grid.height, value)
}

/// A raster whose value increases with column index, in [0, 255].
pub fn column_gradient_raster(grid: OutputGrid) -> Raster {
    let mut raster = Raster::zeros(grid.width, grid.height);
    let denom = (grid.width.max(2) - 1) as f32;
    for row in 0..grid.height {
        for (col, v) in raster.row_mut(row).iter_mut().enumerate() {
            *v = col as f32 / denom * 255.0;
        }
    }
    raster
}

/// Encode a uniform greyscale PNG.
pub fn encode_png(width: u32, height: u32, value: u8) -> Vec<u8> {
    encode(DynamicImage::ImageLuma8(GrayImage::from_pixel(
        width,
        height,
        Luma([value]),
    )), ImageFormat::Png)
}

/// Encode a uniform RGB PNG.
pub fn encode_png_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb))),
        ImageFormat::Png,
    )
}

/// Greyscale image with a white frame of `border` pixels (a few rows of
/// dark margin first, as in annotated satellite images) around a uniform
/// interior of `value`.
///
/// Layout from each edge: 3 rows of `value`, `border` rows of 255, then
/// the interior.
pub fn bordered_image(width: u32, height: u32, border: u32, value: u8) -> GrayImage {
    let frame_start = 3;
    let frame_end = frame_start + border;
    GrayImage::from_fn(width, height, |x, y| {
        let dist = x.min(y).min(width - 1 - x).min(height - 1 - y);
        if dist >= frame_start && dist < frame_end {
            Luma([255])
        } else {
            Luma([value])
        }
    })
}

/// Encode any image in the given format.
pub fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)
        .expect("Failed to encode test image");
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(3, 2);
        assert_eq!(grid, vec![0.0, 1000.0, 2000.0, 1.0, 1001.0, 2001.0]);
    }

    #[test]
    fn test_encode_png_roundtrip() {
        let bytes = encode_png(5, 4, 77);
        let img = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (5, 4));
        assert!(img.pixels().all(|p| p.0[0] == 77));
    }

    #[test]
    fn test_bordered_image_layout() {
        let img = bordered_image(20, 20, 2, 10);
        assert_eq!(img.get_pixel(0, 0).0[0], 10);
        assert_eq!(img.get_pixel(10, 3).0[0], 255);
        assert_eq!(img.get_pixel(10, 4).0[0], 255);
        assert_eq!(img.get_pixel(10, 5).0[0], 10);
        assert_eq!(img.get_pixel(10, 10).0[0], 10);
    }

    #[test]
    fn test_column_gradient() {
        let raster = column_gradient_raster(OutputGrid::new(4, 2).unwrap());
        assert_eq!(raster.get(1, 0), 0.0);
        assert_eq!(raster.get(1, 3), 255.0);
    }
}
