//! Per-source download and cache management.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::ImageFormat;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use cloudmap_common::{CloudmapError, Result, SourceConfig};

use crate::naming::resolve_name;
use crate::remote::{Credentials, RemoteImageSource};

/// Where one source stands for one candidate timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionState {
    pub satellite: String,
    /// Candidate timestamp truncated to the source cadence.
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub cache_path: PathBuf,
    pub purge_pattern: String,
    /// Modification time of the cached file, set once it is on disk.
    pub file_mod_time: Option<DateTime<Utc>>,
}

impl AcquisitionState {
    /// Modification time as epoch seconds (0 before download).
    pub fn mod_time_epoch(&self) -> i64 {
        self.file_mod_time.map(|t| t.timestamp()).unwrap_or(0)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.cache_path.file_name().and_then(|n| n.to_str())
    }
}

/// Resolves, probes, downloads and purges cached source images.
#[derive(Clone)]
pub struct Acquirer {
    remote: Arc<dyn RemoteImageSource>,
    cache_dir: PathBuf,
    credentials: Option<Credentials>,
}

impl Acquirer {
    pub fn new(remote: Arc<dyn RemoteImageSource>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            cache_dir: cache_dir.into(),
            credentials: None,
        }
    }

    /// Credentials sent to sources with `requires_login`.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn credentials_for(&self, source: &SourceConfig) -> Option<&Credentials> {
        if source.requires_login {
            self.credentials.as_ref()
        } else {
            None
        }
    }

    /// Resolve a candidate timestamp into concrete names for `source`.
    pub fn resolve(&self, source: &SourceConfig, timestamp: DateTime<Utc>) -> AcquisitionState {
        let timestamp = source.cadence().truncate(timestamp);
        let name = resolve_name(source, timestamp);

        AcquisitionState {
            satellite: source.name.clone(),
            timestamp,
            url: name.url,
            cache_path: self.cache_dir.join(name.file_name),
            purge_pattern: name.purge_pattern,
            file_mod_time: None,
        }
    }

    /// Whether the image is cached or can be downloaded.
    #[instrument(skip(self, source, state), fields(satellite = %source.name, url = %state.url))]
    pub async fn exists(&self, source: &SourceConfig, state: &AcquisitionState) -> Result<bool> {
        if fs::try_exists(&state.cache_path).await.unwrap_or(false) {
            debug!(path = %state.cache_path.display(), "Found cached image");
            return Ok(true);
        }

        let available = self
            .remote
            .exists(&state.url, self.credentials_for(source))
            .await
            .map_err(|e| CloudmapError::acquisition(&source.name, e))?;

        debug!(available, "Probed remote image");
        Ok(available)
    }

    /// Download the image into the cache unless it is already there, and
    /// record its modification time.
    #[instrument(skip(self, source, state), fields(satellite = %source.name))]
    pub async fn fetch(&self, source: &SourceConfig, state: &mut AcquisitionState) -> Result<()> {
        if fs::try_exists(&state.cache_path).await.unwrap_or(false) {
            debug!(path = %state.cache_path.display(), "Image already downloaded");
            state.file_mod_time = Some(modified_time(&state.cache_path).await?);
            return Ok(());
        }

        info!(url = %state.url, "Downloading image");
        let bytes = self
            .remote
            .fetch(&state.url, self.credentials_for(source))
            .await
            .map_err(|e| CloudmapError::acquisition(&source.name, e))?;

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| CloudmapError::acquisition(&source.name, format!("undecodable image: {}", e)))?;

        fs::create_dir_all(&self.cache_dir).await?;
        let partial = partial_path(&state.cache_path);
        let (target, satellite) = (state.cache_path.clone(), source.name.clone());
        let save_to = partial.clone();
        let saved = tokio::task::spawn_blocking(move || save_image(decoded, &target, &save_to))
            .await
            .map_err(|e| CloudmapError::acquisition(&satellite, format!("save task failed: {}", e)))?
            .map_err(|e| CloudmapError::acquisition(&satellite, e));
        if let Err(e) = saved {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        // Only complete images ever appear under the cache name
        fs::rename(&partial, &state.cache_path).await?;

        let mod_time = modified_time(&state.cache_path).await?;
        info!(
            path = %state.cache_path.display(),
            bytes = bytes.len(),
            "Image cached"
        );
        state.file_mod_time = Some(mod_time);
        Ok(())
    }

    /// Delete cached files of this source other than the current one.
    ///
    /// Returns the number of files removed.
    #[instrument(skip(self, state), fields(satellite = %state.satellite))]
    pub async fn purge(&self, state: &AcquisitionState) -> Result<usize> {
        let current = state.file_name().unwrap_or_default();
        let pattern = glob::Pattern::new(&state.purge_pattern).map_err(|e| {
            CloudmapError::config(format!("invalid purge pattern '{}': {}", state.purge_pattern, e))
        })?;

        let mut entries = match fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == current || !pattern.matches(name) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!(file = %name, "Purged stale image");
                    removed += 1;
                }
                Err(e) => warn!(file = %name, error = %e, "Failed to purge stale image"),
            }
        }

        if removed > 0 {
            info!(removed, "Purged stale images");
        }
        Ok(removed)
    }

    /// Purge (optionally) and download every resolved source, returning the
    /// newest modification time among the cached inputs.
    pub async fn download_all(
        &self,
        sources: &[SourceConfig],
        states: &mut [AcquisitionState],
        purge: bool,
    ) -> Result<DateTime<Utc>> {
        fs::create_dir_all(&self.cache_dir).await?;

        let mut latest: DateTime<Utc> = std::time::UNIX_EPOCH.into();
        for (source, state) in sources.iter().zip(states.iter_mut()) {
            if purge {
                self.purge(state).await?;
            }
            self.fetch(source, state).await?;
            if let Some(t) = state.file_mod_time {
                latest = latest.max(t);
            }
        }
        Ok(latest)
    }
}

/// Scratch file an image is written to before it is renamed into place.
fn partial_path(cache_path: &Path) -> PathBuf {
    let mut name = cache_path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Encode `img` into `dest`, choosing the format from the final `target` name.
fn save_image(
    img: image::DynamicImage,
    target: &Path,
    dest: &Path,
) -> std::result::Result<(), String> {
    let format = ImageFormat::from_path(target).map_err(|e| e.to_string())?;
    // JPEG has no alpha channel
    let img = if format == ImageFormat::Jpeg && img.color().has_alpha() {
        image::DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };
    img.save_with_format(dest, format).map_err(|e| e.to_string())
}

async fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    let modified = fs::metadata(path).await?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}
