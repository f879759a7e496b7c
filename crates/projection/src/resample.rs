//! Resampling of satellite images onto the global Plate-Carrée grid.
//!
//! For every output pixel center the geographic coordinate is projected
//! into the source image and sampled there. Output pixels the source does
//! not cover are filled with `FILL_VALUE`.

use crate::equirectangular::PlateCarree;
use crate::error::{ProjectionError, Result};
use crate::geostationary::Geostationary;
use crate::interpolation::InterpolationMethod;
use crate::polar::PolarStereographic;

/// Value written where the source has no data.
pub const FILL_VALUE: f32 = 0.0;

/// Georeferenced area of a source image.
#[derive(Debug, Clone)]
pub enum SourceArea {
    Geostationary(Geostationary),
    PolarStereographic(PolarStereographic),
}

impl SourceArea {
    /// Fractional pixel position of a geographic coordinate, if visible.
    #[inline]
    pub fn geo_to_pixel(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        match self {
            Self::Geostationary(g) => g.geo_to_pixel(lon, lat),
            Self::PolarStereographic(p) => p.geo_to_pixel(lon, lat),
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Self::Geostationary(g) => g.dimensions(),
            Self::PolarStereographic(p) => p.dimensions(),
        }
    }
}

/// Resampling collaborator used by the projector.
pub trait Resampler: Send + Sync {
    /// Resample `data` (row-major, `area.dimensions()` sized) onto `target`.
    fn resample(&self, data: &[f32], area: &SourceArea, target: &PlateCarree) -> Result<Vec<f32>>;
}

/// Direct per-pixel resampler using a fixed interpolation method.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridResampler {
    pub method: InterpolationMethod,
}

impl GridResampler {
    pub fn new(method: InterpolationMethod) -> Self {
        Self { method }
    }
}

impl Resampler for GridResampler {
    fn resample(&self, data: &[f32], area: &SourceArea, target: &PlateCarree) -> Result<Vec<f32>> {
        let (src_w, src_h) = area.dimensions();
        if data.len() != src_w * src_h {
            return Err(ProjectionError::DimensionMismatch {
                width: src_w,
                height: src_h,
                actual: data.len(),
            });
        }
        if target.is_empty() {
            return Err(ProjectionError::EmptyGrid {
                width: target.width,
                height: target.height,
            });
        }

        let lons: Vec<f64> = (0..target.width).map(|c| target.pixel_lon(c)).collect();
        let mut output = vec![FILL_VALUE; target.len()];

        for (row, out_row) in output.chunks_exact_mut(target.width).enumerate() {
            let lat = target.pixel_lat(row);
            for (out, &lon) in out_row.iter_mut().zip(&lons) {
                if let Some((col, r)) = area.geo_to_pixel(lon, lat) {
                    if let Some(v) = self.method.sample(data, src_w, src_h, col, r) {
                        *out = v;
                    }
                }
            }
        }

        Ok(output)
    }
}
