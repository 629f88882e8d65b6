//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building the shared HTTP client with the configured user agent
//! - GET requests with a bounded body size
//! - A single retry for transient network failures
//! - Error classification

use crate::config::CrawlerConfig;
use chrono::{DateTime, Utc};
use reqwest::{header::CONTENT_TYPE, Client};
use std::io::ErrorKind;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a fetch did not produce a usable body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Request timeout")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Connection lost: {0}")]
    Reset(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to read body: {0}")]
    Body(String),
}

impl FetchError {
    /// Timeouts, connection failures and dropped connections are worth one more attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect(_) | Self::Reset(_))
    }

    fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_request() || connection_lost(e) {
            Self::Reset(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Whether an io error in the source chain says the peer went away
fn connection_lost(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

/// Outcome of fetching one URL
///
/// Failures are carried in `error` instead of being returned as `Err`, so
/// the caller decides what to do with each page.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL that was requested
    pub url: Url,
    /// URL after redirects
    pub final_url: Url,
    pub status_code: Option<u16>,
    pub body: Vec<u8>,
    /// Set when the body hit the size cap and was cut short
    pub truncated: bool,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub error: Option<FetchError>,
}

impl FetchResult {
    fn failed(url: &Url, status_code: Option<u16>, error: FetchError) -> Self {
        Self {
            url: url.clone(),
            final_url: url.clone(),
            status_code,
            body: Vec::new(),
            truncated: false,
            content_type: None,
            fetched_at: Utc::now(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use driftnet::config::CrawlerConfig;
/// use driftnet::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout_duration())
        .connect_timeout(config.request_timeout_duration().min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues page requests with a body cap and one retry on transient errors
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_body_bytes: usize,
    retry_backoff: Duration,
}

impl Fetcher {
    pub fn new(client: Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            max_body_bytes: config.max_body_bytes,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Fetches a URL
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Non-2xx status | Returned with `HttpStatus`, no retry |
    /// | Timeout | One retry after the backoff |
    /// | Connection failure | One retry after the backoff |
    /// | Connection reset or closed mid-request | One retry after the backoff |
    /// | Other network or body error | Returned, no retry |
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let first = self.fetch_once(url).await;

        match &first.error {
            Some(error) if error.is_transient() => {
                tracing::debug!(
                    "Transient failure for {} ({}), retrying in {:?}",
                    url,
                    error,
                    self.retry_backoff
                );
                tokio::time::sleep(self.retry_backoff).await;
                self.fetch_once(url).await
            }
            _ => first,
        }
    }

    async fn fetch_once(&self, url: &Url) -> FetchResult {
        let mut response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return FetchResult::failed(url, None, FetchError::from_reqwest(&e)),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResult::failed(
                url,
                Some(status.as_u16()),
                FetchError::HttpStatus(status.as_u16()),
            );
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let mut body = Vec::new();
        let mut truncated = false;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = self.max_body_bytes.saturating_sub(body.len());
                    if chunk.len() > room {
                        body.extend_from_slice(&chunk[..room]);
                        truncated = true;
                        break;
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    return FetchResult::failed(
                        url,
                        Some(status.as_u16()),
                        FetchError::from_reqwest(&e),
                    )
                }
            }
        }

        if truncated {
            tracing::debug!("Truncated body of {} at {} bytes", url, self.max_body_bytes);
        }

        FetchResult {
            url: url.clone(),
            final_url,
            status_code: Some(status.as_u16()),
            body,
            truncated,
            content_type,
            fetched_at: Utc::now(),
            error: None,
        }
    }
}
