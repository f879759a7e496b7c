//! Remote image providers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

/// HTTP basic credentials for providers that require a login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("not found: {0}")]
    NotFound(String),
}

/// Source of raw satellite image bytes.
#[async_trait]
pub trait RemoteImageSource: Send + Sync {
    /// Lightweight existence probe (HEAD-equivalent).
    async fn exists(&self, url: &str, credentials: Option<&Credentials>) -> Result<bool, RemoteError>;

    /// Retrieve the raw bytes (GET-equivalent).
    async fn fetch(&self, url: &str, credentials: Option<&Credentials>) -> Result<Bytes, RemoteError>;
}

/// reqwest-backed provider.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
}

impl HttpRemote {
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("cloudmap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteImageSource for HttpRemote {
    async fn exists(&self, url: &str, credentials: Option<&Credentials>) -> Result<bool, RemoteError> {
        let response = self
            .request(reqwest::Method::HEAD, url, credentials)
            .send()
            .await?;
        debug!(url = %url, status = %response.status(), "HEAD");
        Ok(response.status() == StatusCode::OK)
    }

    async fn fetch(&self, url: &str, credentials: Option<&Credentials>) -> Result<Bytes, RemoteError> {
        let response = self
            .request(reqwest::Method::GET, url, credentials)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}

/// In-memory provider serving a fixed set of URLs.
///
/// Counts requests so callers can check that cache hits never reach the
/// remote.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    images: Arc<Mutex<HashMap<String, Bytes>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `bytes` at `url`.
    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<Bytes>) {
        if let Ok(mut images) = self.images.lock() {
            images.insert(url.into(), bytes.into());
        }
    }

    /// URLs requested so far (probes and fetches), in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(&self, url: &str) -> Option<Bytes> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.images.lock().ok().and_then(|i| i.get(url).cloned())
    }
}

#[async_trait]
impl RemoteImageSource for MemoryRemote {
    async fn exists(&self, url: &str, _credentials: Option<&Credentials>) -> Result<bool, RemoteError> {
        Ok(self.record(url).is_some())
    }

    async fn fetch(&self, url: &str, _credentials: Option<&Credentials>) -> Result<Bytes, RemoteError> {
        self.record(url)
            .ok_or_else(|| RemoteError::NotFound(url.to_string()))
    }
}
