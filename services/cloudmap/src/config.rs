//! Configuration loading for a compositing run.
//!
//! One YAML file describes the output image, where and how images are
//! downloaded, processing options and the satellite sources.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use acquisition::{Credentials, SyncPolicy};
use cloudmap_common::{validate_sources, Cadence, OutputGrid, ResolutionTier, SourceConfig};
use compositor::{ProjectionOptions, DEFAULT_POLAR_BAND};
use projection::InterpolationMethod;

/// Environment variable overriding `download.username`.
pub const USERNAME_ENV: &str = "CLOUDMAP_USERNAME";
/// Environment variable overriding `download.password`.
pub const PASSWORD_ENV: &str = "CLOUDMAP_PASSWORD";

/// Root configuration loaded from the YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudmapConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub satellites: Vec<SourceConfig>,
}

/// Output image location and size.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_output_file")]
    pub file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            dir: default_output_dir(),
            file: default_output_file(),
        }
    }
}

fn default_width() -> usize {
    2048
}

fn default_height() -> usize {
    1024
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_file() -> String {
    "clouds_2048.jpg".to_string()
}

/// Image download settings.
#[derive(Clone, Deserialize)]
pub struct DownloadConfig {
    /// Cache for raw satellite images (created if missing).
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Resolution tier fetched for every source.
    #[serde(default)]
    pub resolution: ResolutionTier,
    /// Delete older cached images of each source.
    #[serde(default)]
    pub purge: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            resolution: ResolutionTier::default(),
            purge: false,
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("cache_dir", &self.cache_dir)
            .field("resolution", &self.resolution)
            .field("purge", &self.purge)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("cloudmap")
}

fn default_timeout_secs() -> u64 {
    60
}

/// Projection and compositing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Trust kernel half-width in degrees.
    #[serde(default = "default_trust_width")]
    pub trust_width: f64,
    /// Fraction of the output height mirrored at each pole.
    #[serde(default = "default_polar_band")]
    pub polar_band: f64,
    #[serde(default)]
    pub interpolation: InterpolationMethod,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            trust_width: default_trust_width(),
            polar_band: default_polar_band(),
            interpolation: InterpolationMethod::default(),
            sync: SyncConfig::default(),
        }
    }
}

fn default_workers() -> usize {
    1
}

fn default_trust_width() -> f64 {
    cloudmap_common::DEFAULT_TRUST_WIDTH
}

fn default_polar_band() -> f64 {
    DEFAULT_POLAR_BAND
}

/// Overrides for the backward time search. Unset values are derived
/// from the sources' cadence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub step_hours: Option<u32>,
    #[serde(default)]
    pub max_tries: Option<u32>,
}

impl CloudmapConfig {
    /// Read, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Loading configuration");
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        debug!(
            satellites = config.satellites.len(),
            width = config.output.width,
            height = config.output.height,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Replace credentials with values found through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(username) = lookup(USERNAME_ENV).filter(|v| !v.is_empty()) {
            self.download.username = Some(username);
        }
        if let Some(password) = lookup(PASSWORD_ENV).filter(|v| !v.is_empty()) {
            self.download.password = Some(password);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.grid()?;

        if self.processing.workers == 0 {
            bail!("processing.workers must be at least 1");
        }
        if !(self.processing.trust_width > 0.0) {
            bail!(
                "processing.trust_width must be > 0, got {}",
                self.processing.trust_width
            );
        }
        if !(0.0..0.5).contains(&self.processing.polar_band) {
            bail!(
                "processing.polar_band must be in [0, 0.5), got {}",
                self.processing.polar_band
            );
        }
        if let Some(hours) = self.processing.sync.step_hours {
            if Cadence::from_hours(hours).is_none() {
                bail!(
                    "processing.sync.step_hours must divide 24 evenly, got {}",
                    hours
                );
            }
        }
        if self.processing.sync.max_tries == Some(0) {
            bail!("processing.sync.max_tries must be at least 1");
        }

        validate_sources(&self.satellites)?;

        if let Some(source) = self.satellites.iter().find(|s| s.requires_login) {
            if self.credentials().is_none() {
                bail!(
                    "source '{}' requires a login: set download.username and download.password \
                     (or {} and {})",
                    source.name,
                    USERNAME_ENV,
                    PASSWORD_ENV
                );
            }
        }
        Ok(())
    }

    pub fn grid(&self) -> Result<OutputGrid> {
        Ok(OutputGrid::new(self.output.width, self.output.height)?)
    }

    /// Sources with the configured resolution tier applied.
    pub fn sources(&self) -> Vec<SourceConfig> {
        self.satellites
            .iter()
            .cloned()
            .map(|s| s.with_tier(self.download.resolution))
            .collect()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.download.username.as_deref().filter(|v| !v.is_empty())?;
        let password = self.download.password.as_deref().filter(|v| !v.is_empty())?;
        Some(Credentials::new(username, password))
    }

    pub fn sync_policy(&self, sources: &[SourceConfig]) -> SyncPolicy {
        let mut policy = SyncPolicy::for_sources(sources);
        if let Some(step) = self.processing.sync.step_hours.and_then(Cadence::from_hours) {
            policy.step = step;
        }
        if let Some(max_tries) = self.processing.sync.max_tries {
            policy.max_tries = max_tries;
        }
        policy
    }

    pub fn projection_options(&self) -> Result<ProjectionOptions> {
        let mut options = ProjectionOptions::new(self.grid()?);
        options.trust_width = self.processing.trust_width;
        options.polar_band = self.processing.polar_band;
        Ok(options)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.file)
    }
}
