//! Per-source projection onto the shared output grid.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use cloudmap_common::{
    Channel, CloudmapError, OutputGrid, Raster, Result, SourceConfig, SourceProjection,
    DEFAULT_TRUST_WIDTH,
};
use projection::{
    Geostationary, GridResampler, PlateCarree, PolarStereographic, Resampler, SourceArea,
};

use crate::footprint::{crop_to_footprint, smooth_grid_lines};
use crate::weight::weight_raster;

/// Height of the mirrored polar band as a fraction of the output height.
pub const DEFAULT_POLAR_BAND: f64 = 90.0 / 1024.0;

/// Per-run projection settings, passed explicitly to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionOptions {
    pub grid: OutputGrid,
    /// Default trust kernel half-width (degrees).
    pub trust_width: f64,
    /// Fraction of the output height mirrored at each pole.
    pub polar_band: f64,
}

impl ProjectionOptions {
    pub fn new(grid: OutputGrid) -> Self {
        Self {
            grid,
            trust_width: DEFAULT_TRUST_WIDTH,
            polar_band: DEFAULT_POLAR_BAND,
        }
    }
}

/// One source's contribution: resampled intensities and trust weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Projected {
    pub image: Raster,
    pub weight: Raster,
}

/// One unit of compositing work.
#[derive(Debug, Clone)]
pub struct CompositeJob {
    pub source: SourceConfig,
    /// Cached raw image of the source.
    pub image_path: PathBuf,
}

impl CompositeJob {
    pub fn new(source: SourceConfig, image_path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            image_path: image_path.into(),
        }
    }
}

/// Anything that can turn a job into a projected pair.
pub trait SourceProjector: Send + Sync {
    fn project(&self, job: &CompositeJob) -> Result<Projected>;
}

/// Crops, resamples, rescales and weights source images.
#[derive(Clone)]
pub struct Projector {
    resampler: Arc<dyn Resampler>,
    options: ProjectionOptions,
}

impl Projector {
    pub fn new(options: ProjectionOptions) -> Self {
        Self::with_resampler(options, Arc::new(GridResampler::default()))
    }

    pub fn with_resampler(options: ProjectionOptions, resampler: Arc<dyn Resampler>) -> Self {
        Self { resampler, options }
    }

    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }

    /// Project an already decoded source image.
    pub fn project_raster(&self, source: &SourceConfig, raw: &Raster) -> Result<Projected> {
        let grid = self.options.grid;
        let mut cropped = crop_to_footprint(source, raw)?;
        if source.smooth_grid {
            cropped = smooth_grid_lines(&cropped);
        }
        let (src_w, src_h) = cropped.dimensions();
        debug!(
            satellite = %source.name,
            width = src_w,
            height = src_h,
            "Cropped source image"
        );

        let area = source_area(source, src_w, src_h)?;
        let target = PlateCarree::new(grid.width, grid.height)
            .map_err(|e| CloudmapError::projection(&source.name, e))?;

        let resampled = self
            .resampler
            .resample(cropped.data(), &area, &target)
            .map_err(|e| CloudmapError::projection(&source.name, e))?;

        let mut image = Raster::from_vec(grid.width, grid.height, resampled).ok_or_else(|| {
            CloudmapError::projection(&source.name, "resampler returned wrong output size")
        })?;

        image.map_in_place(|v| source.rescale.apply(v));

        if source.polar_mirror && source.projection.is_geostationary() {
            mirror_polar_rows(&mut image, polar_band_rows(grid.height, self.options.polar_band));
        }

        let weight = weight_raster(source, grid, self.options.trust_width);
        Ok(Projected { image, weight })
    }
}

impl SourceProjector for Projector {
    fn project(&self, job: &CompositeJob) -> Result<Projected> {
        let raw = load_source_image(&job.source, &job.image_path)?;
        self.project_raster(&job.source, &raw)
    }
}

/// Georeference a cropped image of `width` x `height` pixels.
pub fn source_area(source: &SourceConfig, width: usize, height: usize) -> Result<SourceArea> {
    let area = match source.projection {
        SourceProjection::Geostationary {
            extent,
            semi_major_axis,
            semi_minor_axis,
            false_y,
            satellite_height,
        } => Geostationary::full_disk(
            source.longitude,
            semi_major_axis,
            semi_minor_axis,
            satellite_height,
            extent,
            false_y,
            width,
            height,
        )
        .map(SourceArea::Geostationary),
        SourceProjection::PolarStereographic { latitude, extent } => {
            PolarStereographic::wgs84(source.longitude, latitude, extent, width, height)
                .map(SourceArea::PolarStereographic)
        }
    };
    area.map_err(|e| CloudmapError::projection(&source.name, e))
}

/// Decode a cached image into intensities using the source's channel.
pub fn load_source_image(source: &SourceConfig, path: &Path) -> Result<Raster> {
    let img = image::open(path).map_err(|e| {
        CloudmapError::projection(&source.name, format!("cannot decode {}: {}", path.display(), e))
    })?;

    let (width, height) = (img.width() as usize, img.height() as usize);
    let data: Vec<f32> = match source.channel {
        Channel::Luma => img.to_luma8().pixels().map(|p| p.0[0] as f32).collect(),
        Channel::Red => img.to_rgb8().pixels().map(|p| p.0[0] as f32).collect(),
    };

    Raster::from_vec(width, height, data)
        .ok_or_else(|| CloudmapError::projection(&source.name, "decoded image has no pixels"))
}

/// Number of rows mirrored at each pole.
pub fn polar_band_rows(height: usize, band: f64) -> usize {
    (band * height as f64).floor().max(0.0) as usize
}

/// Fill the `band` rows nearest each pole with a mirror image of the rows
/// just equatorward of them.
///
/// This is a visual approximation for latitudes geostationary satellites
/// cannot see, not derived data.
pub fn mirror_polar_rows(image: &mut Raster, band: usize) {
    let height = image.height();
    if band == 0 || 2 * band >= height {
        return;
    }
    for i in 0..band {
        image.copy_row(2 * band - i, i);
    }
    for k in 0..band {
        image.copy_row(height - band - k, height - band + k);
    }
}
