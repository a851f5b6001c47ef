//! Media resource fetching
//!
//! Media is pulled with a dedicated HTTP client that never reuses
//! connections: every request carries `Connection: close` and the idle pool
//! is disabled. Bulk sequential pulls from the media CDN otherwise exhaust
//! the server-side connection slack.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_fixed_retry;
use async_trait::async_trait;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};

/// Abstraction over fetching a single binary resource
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the full body at `url`
    ///
    /// Fails with [`Error::FetchFailed`] once all attempts are used up.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Production [`ResourceFetcher`] over HTTP with a fixed-delay retry
#[derive(Clone)]
pub struct HttpResourceFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpResourceFetcher {
    /// Create a fetcher with its own non-pooling client
    pub fn new(retry: RetryConfig) -> Result<Self> {
        Ok(Self::with_client(media_client()?, retry))
    }

    /// Create a fetcher around an explicitly constructed client
    pub fn with_client(client: reqwest::Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self
            .client
            .get(url)
            .header(CONNECTION, "close")
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("error while querying the resource: {status}"));
        }

        let body = response.bytes().await.map_err(|e| e.to_string())?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(url, "Fetching media resource");

        with_fixed_retry(&self.retry, move || self.fetch_once(url))
            .await
            .map_err(|cause| Error::FetchFailed {
                url: url.to_string(),
                cause,
            })
    }
}

/// Build the media client: no idle connections kept, `Connection: close` by default
pub fn media_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .pool_max_idle_per_host(0)
        .build()?;
    Ok(client)
}
