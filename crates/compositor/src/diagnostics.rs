//! Optional dumps of intermediate rasters for debugging a run.

use std::path::PathBuf;

use image::{GrayImage, Luma};
use tracing::{debug, warn};

use cloudmap_common::Raster;

use crate::projector::Projected;

/// Writes greyscale JPEGs of per-source and summary rasters into a
/// directory, each scaled so that its maximum maps to white.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: PathBuf,
}

impl Diagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `image_N.jpeg` and `weight_N.jpeg` for the N-th source (1-based).
    pub fn save_source(&self, n: usize, projected: &Projected) {
        self.save(&projected.image, &format!("image_{}.jpeg", n));
        self.save(&projected.weight, &format!("weight_{}.jpeg", n));
    }

    /// `weight_sum.jpeg` and `composite.jpeg`.
    pub fn save_summary(&self, weight_sum: &Raster, composite: &Raster) {
        self.save(weight_sum, "weight_sum.jpeg");
        self.save(composite, "composite.jpeg");
    }

    // Diagnostics never fail a run.
    fn save(&self, raster: &Raster, name: &str) {
        let path = self.dir.join(name);
        let result = std::fs::create_dir_all(&self.dir)
            .map_err(|e| e.to_string())
            .and_then(|_| normalized_image(raster).save(&path).map_err(|e| e.to_string()));
        match result {
            Ok(()) => debug!(path = %path.display(), "Saved diagnostic raster"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save diagnostic raster"),
        }
    }
}

/// Scale `raster` to 0..255 by its maximum (all black when the maximum is
/// not positive).
pub fn normalized_image(raster: &Raster) -> GrayImage {
    let max = raster.max().filter(|m| *m > 0.0).unwrap_or(1.0);
    let (width, height) = raster.dimensions();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let v = raster.get(y as usize, x as usize) / max * 255.0;
        Luma([v.clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_image_scales_to_max() {
        let raster = Raster::from_vec(3, 1, vec![0.0, 0.5, 1.0]).unwrap();
        let img = normalized_image(&raster);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(1, 0).0[0], 127);
        assert_eq!(img.get_pixel(2, 0).0[0], 255);
    }

    #[test]
    fn test_save_source_files() {
        let dir = tempfile::tempdir().unwrap();
        let diagnostics = Diagnostics::new(dir.path().join("debug"));
        let projected = Projected {
            image: Raster::filled(8, 4, 100.0),
            weight: Raster::filled(8, 4, 0.3),
        };

        diagnostics.save_source(2, &projected);
        diagnostics.save_summary(&projected.weight, &projected.image);

        for name in ["image_2.jpeg", "weight_2.jpeg", "weight_sum.jpeg", "composite.jpeg"] {
            assert!(dir.path().join("debug").join(name).exists(), "missing {}", name);
        }
    }
}
