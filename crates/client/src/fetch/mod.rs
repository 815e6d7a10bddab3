//! Outbound HTTP fetching.
//!
//! ### Contract
//! - `fetch(url, headers)` returns status, body and headers for any HTTP
//!   answer, including non-200 ones; the caller decides what a status means.
//! - Timeouts, connection failures and oversized bodies are
//!   `Error::Transport`.
//!
//! ### Limits
//! - Every call is bounded by the client's timeout.
//! - Max redirects: 5
//! - Max body bytes: configurable

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, conversion_endpoint};

use subrelay_core::Error;

/// Headers forwarded from an upstream answer to the caller.
pub const PASSTHROUGH_HEADERS: &[&str] = &[
    "subscription-userinfo",
    "profile-update-interval",
    "profile-web-page-url",
    "content-disposition",
    "cache-control",
];

pub const SUBSCRIPTION_USERINFO: &str = "subscription-userinfo";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent used when a request does not set one (default: "clash-verge/v2.4.3")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "clash-verge/v2.4.3".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(30_000),
            max_redirects: 5,
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
}

impl FetchResponse {
    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// A response header as a string, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Copy of the headers worth forwarding to the caller.
    pub fn passthrough_headers(&self) -> header::HeaderMap {
        let mut forwarded = header::HeaderMap::new();
        for name in PASSTHROUGH_HEADERS {
            if let Some(value) = self.headers.get(*name) {
                forwarded.insert(*name, value.clone());
            }
        }
        forwarded
    }
}

/// Outbound GET capability.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` with the given request headers.
    async fn fetch(&self, url: &str, headers: &header::HeaderMap) -> Result<FetchResponse, Error>;
}

/// reqwest-backed fetcher.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: usize) -> Error {
        Error::Transport(format!("{len} bytes exceeds {}", self.config.max_bytes))
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Transport(format!("timed out fetching {url}"))
    } else {
        Error::Transport(format!("network error fetching {url}: {err}"))
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, url: &str, headers: &header::HeaderMap) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(|e| transport_error(url, &e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(self.too_large(bytes.len()));
        }

        tracing::debug!(
            status,
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched upstream document"
        );

        Ok(FetchResponse { url: url.to_string(), status, bytes, headers })
    }
}
