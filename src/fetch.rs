//! Network boundary for asset downloads.
//!
//! The synchronizer never talks to the network directly; it goes through the
//! `AssetFetcher` trait so tests can substitute a scripted fake. The real
//! implementation is a thin wrapper over `reqwest`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::config::Config;
use crate::error::FetchError;
use crate::models::CapturedResponse;

/// HTTP request timeout in seconds.
/// Generous enough for large shell assets on slow links while still failing
/// in bounded time.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// How a fetch interacts with intermediate HTTP caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Normal caching semantics.
    Default,
    /// Bypass intermediate caches and revalidate with the origin server.
    /// Used when staging the core set during install.
    Reload,
}

/// Asset download boundary.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch `url`. A non-2xx response is returned as a `CapturedResponse`
    /// with `ok() == false`, not as an error; only transport failures are
    /// errors.
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<CapturedResponse, FetchError>;
}

#[async_trait]
impl<T: AssetFetcher + ?Sized> AssetFetcher for Arc<T> {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<CapturedResponse, FetchError> {
        (**self).fetch(url, mode).await
    }
}

/// `reqwest`-backed fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(config.request_timeout_secs()))
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, mode: FetchMode) -> Result<CapturedResponse, FetchError> {
        let mut request = self.client.get(url);
        if mode == FetchMode::Reload {
            request = request.header(header::CACHE_CONTROL, "no-cache");
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(url, status, bytes = body.len(), "fetched asset");
        Ok(CapturedResponse::new(status, content_type, body))
    }
}
