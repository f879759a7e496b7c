//! Cropping raw source images to their valid data area.

use cloudmap_common::{CloudmapError, CropLimits, Footprint, Raster, Result, SourceConfig};

/// Rows at the very edge that are never part of the border search.
const BORDER_SEARCH_START: usize = 3;
/// Pixels ignored at both ends of a line when looking for the border.
const BORDER_SEARCH_MARGIN: usize = 10;
/// Intensity at or above which a pixel belongs to a drawn grid line.
const GRID_LINE_LEVEL: f32 = 250.0;

/// Crop `image` to the footprint of `source`, scaled by its resolution tier.
pub fn crop_to_footprint(source: &SourceConfig, image: &Raster) -> Result<Raster> {
    let limits = match source.footprint {
        Footprint::Full => return Ok(image.clone()),
        Footprint::AutoBorder => detect_border(image),
        Footprint::Limits { .. } => source
            .scaled_limits()
            .ok_or_else(|| CloudmapError::projection(&source.name, "missing crop limits"))?,
    };

    let (width, height) = image.dimensions();
    if limits.right as usize > width
        || limits.bottom as usize > height
        || limits.width() == 0
        || limits.height() == 0
    {
        return Err(CloudmapError::projection(
            &source.name,
            format!(
                "footprint {:?} does not fit the {}x{} image (tier {})",
                limits, width, height, source.tier
            ),
        ));
    }

    Ok(crop(image, limits))
}

/// Copy the rectangle `limits` out of `image`. Limits must be in bounds.
pub fn crop(image: &Raster, limits: CropLimits) -> Raster {
    let (left, right) = (limits.left as usize, limits.right as usize);
    let mut data = Vec::with_capacity(limits.width() as usize * limits.height() as usize);
    for row in limits.top as usize..limits.bottom as usize {
        data.extend_from_slice(&image.row(row)[left..right]);
    }
    Raster::from_vec(right - left, limits.height() as usize, data)
        .unwrap_or_else(|| Raster::zeros(0, 0))
}

/// Find the inner edge of the white annotation frame on all four sides.
///
/// On each side the search skips a few edge lines, waits for a line that
/// is entirely white (ignoring its ends), and stops at the first line
/// after that which is not. A side without such a frame is not cropped.
pub fn detect_border(image: &Raster) -> CropLimits {
    let (width, height) = image.dimensions();

    let top = first_inner_line(height, width, |line, k| image.get(line, k));
    let bottom = first_inner_line(height, width, |line, k| image.get(height - 1 - line, k));
    let left = first_inner_line(width, height, |line, k| image.get(k, line));
    let right = first_inner_line(width, height, |line, k| image.get(k, width - 1 - line));

    CropLimits {
        top: top as u32,
        bottom: (height - bottom) as u32,
        left: left as u32,
        right: (width - right) as u32,
    }
}

/// Index of the first line after a fully white line, or 0.
fn first_inner_line(lines: usize, line_len: usize, value: impl Fn(usize, usize) -> f32) -> usize {
    if line_len <= 2 * BORDER_SEARCH_MARGIN {
        return 0;
    }
    let span = BORDER_SEARCH_MARGIN..line_len - BORDER_SEARCH_MARGIN;

    let mut in_border = false;
    for line in BORDER_SEARCH_START..lines {
        let min = span.clone().map(|k| value(line, k)).fold(f32::INFINITY, f32::min);
        if in_border && min < 255.0 {
            return line;
        }
        if !in_border && min >= 255.0 {
            in_border = true;
        }
    }
    0
}

/// Soften the white grid lines drawn over polar mosaics.
///
/// A 3x3 median removes thin lines. Pixels near the rim of the white areas
/// that survive it are replaced by the 7x7 minimum of the median image.
pub fn smooth_grid_lines(image: &Raster) -> Raster {
    let median = neighbourhood(image, 1, |window| {
        window.sort_by(f32::total_cmp);
        window[window.len() / 2]
    });
    let floor = neighbourhood(&median, 3, |window| {
        window.iter().copied().fold(f32::INFINITY, f32::min)
    });

    let mut white = image.clone();
    white.map_in_place(|v| if v >= GRID_LINE_LEVEL { 1.0 } else { 0.0 });
    let rim = neighbourhood(&white, 1, |window| {
        let centre = window[window.len() / 2];
        if centre > 0.0 && window.contains(&0.0) {
            1.0
        } else {
            0.0
        }
    });
    let mask = neighbourhood(&rim, 1, |window| {
        window.iter().copied().fold(0.0, f32::max)
    });

    let data = median
        .data()
        .iter()
        .zip(floor.data())
        .zip(mask.data())
        .map(|((&m, &f), &k)| if k > 0.0 { f } else { m })
        .collect();
    Raster::from_vec(image.width(), image.height(), data).unwrap_or_else(|| median.clone())
}

/// Apply `reduce` to the `(2r+1)^2` window around every pixel, repeating
/// edge pixels beyond the image bounds. The centre pixel is always the
/// middle element of the window.
fn neighbourhood(image: &Raster, radius: usize, mut reduce: impl FnMut(&mut Vec<f32>) -> f32) -> Raster {
    let (width, height) = image.dimensions();
    let r = radius as isize;
    let mut out = Raster::zeros(width, height);
    let mut window = Vec::with_capacity((2 * radius + 1) * (2 * radius + 1));

    for row in 0..height {
        for col in 0..width {
            window.clear();
            for dr in -r..=r {
                let y = (row as isize + dr).clamp(0, height as isize - 1) as usize;
                for dc in -r..=r {
                    let x = (col as isize + dc).clamp(0, width as isize - 1) as usize;
                    window.push(image.get(y, x));
                }
            }
            out.set(row, col, reduce(&mut window));
        }
    }
    out
}
