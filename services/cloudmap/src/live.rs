//! Download of a prebuilt global cloud map.
//!
//! An alternative to compositing locally: a public service publishes the
//! finished map in a few fixed sizes.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{header, Client};
use tracing::{debug, info};

use crate::output::set_modified;

pub const LIVE_BASE_URL: &str = "https://clouds.matteason.co.uk/images/";

/// Sizes published by the live map service.
pub const AVAILABLE_RESOLUTIONS: [(u32, u32); 4] =
    [(1024, 512), (2048, 1024), (4096, 2048), (8192, 4096)];

/// Requested map size, e.g. `2048x1024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveResolution {
    pub width: u32,
    pub height: u32,
}

impl LiveResolution {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if !AVAILABLE_RESOLUTIONS.contains(&(width, height)) {
            bail!(
                "{}x{} is not a valid resolution, available: {}",
                width,
                height,
                available_list()
            );
        }
        Ok(Self { width, height })
    }

    /// Default output file name for this size.
    pub fn file_name(&self) -> String {
        format!("clouds_{}.jpg", self.width)
    }
}

impl FromStr for LiveResolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse().with_context(|| format!("invalid width in '{}'", s))?;
        let height = h.trim().parse().with_context(|| format!("invalid height in '{}'", s))?;
        Self::new(width, height)
    }
}

fn available_list() -> String {
    AVAILABLE_RESOLUTIONS
        .iter()
        .map(|(w, h)| format!("{}x{}", w, h))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    Downloaded { modified: DateTime<Utc> },
    UpToDate { modified: DateTime<Utc> },
}

pub struct LiveMap {
    client: Client,
    url: String,
}

impl LiveMap {
    pub fn new(resolution: LiveResolution, timeout: Duration) -> Result<Self> {
        Self::with_base_url(LIVE_BASE_URL, resolution, timeout)
    }

    pub fn with_base_url(base_url: &str, resolution: LiveResolution, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cloudmap/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        let url = format!(
            "{}{}x{}/clouds.jpg",
            base_url, resolution.width, resolution.height
        );
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download the map to `path` unless the local copy is at least as
    /// new as the remote one. `force` always downloads.
    pub async fn download(&self, path: &Path, force: bool) -> Result<LiveOutcome> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let remote_time = self.last_modified().await?;
        let local_time = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        match local_time {
            _ if force => info!(path = %path.display(), "Forced download of live map"),
            None => debug!(path = %path.display(), "No local live map"),
            Some(local) if remote_time > local => {
                debug!(%local, remote = %remote_time, "Local live map is outdated")
            }
            Some(local) => {
                info!(path = %path.display(), %local, "Live map is new enough");
                return Ok(LiveOutcome::UpToDate { modified: local });
            }
        }

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?;
        if !response.status().is_success() {
            bail!("HTTP error: {} for {}", response.status(), self.url);
        }
        let bytes = response.bytes().await.context("Error reading response body")?;
        debug!(url = %self.url, bytes = bytes.len(), "Received live map");

        tokio::fs::write(path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        set_modified(path, remote_time)?;

        info!(path = %path.display(), modified = %remote_time, "Downloaded live map");
        Ok(LiveOutcome::Downloaded {
            modified: remote_time,
        })
    }

    async fn last_modified(&self) -> Result<DateTime<Utc>> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .await
            .with_context(|| format!("HEAD {} failed", self.url))?;
        if !response.status().is_success() {
            bail!("HTTP error: {} for {}", response.status(), self.url);
        }

        let value = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("{} has no Last-Modified header", self.url))?;
        parse_http_date(value)
    }
}

/// Parse an HTTP date such as `Tue, 19 Nov 2013 18:00:00 GMT`.
pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("invalid HTTP date '{}'", value))
}
