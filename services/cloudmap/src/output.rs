//! Writing the final composite image.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::{Rgb, RgbImage};
use tracing::{debug, info};

use cloudmap_common::Raster;

/// Saves the composite as an RGB image whose modification time is the
/// newest contributing input's.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    file: String,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>, file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file: file.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }

    /// Modification time of the existing output, if any.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        std::fs::metadata(self.path())
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    /// Whether the existing output already reflects inputs as new as
    /// `latest_input`.
    pub fn is_up_to_date(&self, latest_input: DateTime<Utc>) -> bool {
        matches!(self.modified(), Some(t) if t >= latest_input)
    }

    /// Replace the output with `raster` and stamp it with `mod_time`.
    pub fn write(&self, raster: &Raster, mod_time: DateTime<Utc>) -> Result<PathBuf> {
        let path = self.path();
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;

        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed previous output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()))
            }
        }

        to_rgb_image(raster)
            .save(&path)
            .with_context(|| format!("Failed to save output image: {}", path.display()))?;
        set_modified(&path, mod_time)?;

        info!(
            path = %path.display(),
            width = raster.width(),
            height = raster.height(),
            modified = %mod_time,
            "Wrote cloud map"
        );
        Ok(path)
    }
}

/// Grey intensities replicated into all three channels, rounded and
/// clamped to 0..=255.
pub fn to_rgb_image(raster: &Raster) -> RgbImage {
    let (width, height) = raster.dimensions();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let v = raster.get(y as usize, x as usize).round().clamp(0.0, 255.0) as u8;
        Rgb([v, v, v])
    })
}

/// Set a file's modification time.
pub fn set_modified(path: &Path, time: DateTime<Utc>) -> Result<()> {
    let file = std::fs::File::options()
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.set_modified(SystemTime::from(time))
        .with_context(|| format!("Failed to set modification time of {}", path.display()))
}
