//! Blocking HTTP fetcher.
//!
//! ### Request shaping
//! - Trim whitespace, ensure scheme (default: `https`), drop fragments
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Failure classification
//! - Transport errors, HTTP 429 and 5xx are `RequestFailure` and may be retried.
//! - Any other non-success status is `HttpError`.

pub mod url;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, bare_host, parse_lenient, request_url};

use urlcache_core::config::AppConfig;
use urlcache_core::{Error, FetchOutcome, FetchedPage, Fetcher};

use crate::extract::page_metadata;

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: 5 * 1024 * 1024,
            timeout: config.timeout(),
            max_redirects: 5,
        }
    }
}

/// HTTP fetcher backed by a blocking reqwest client.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
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
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_metadata(&self, url: &str) -> Result<FetchOutcome, Error> {
        let page = self.get(url)?;
        let metadata = page_metadata(&page);
        Ok(FetchOutcome { metadata, page: Some(page) })
    }

    fn get(&self, url_str: &str) -> Result<FetchedPage, Error> {
        let start = Instant::now();
        let url = request_url(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .map_err(|e| Error::RequestFailure(format!("network error for {}: {}", url, e)))?;

        let status = response.status();
        check_status(status, url.as_str())?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::HttpError(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .map_err(|e| Error::RequestFailure(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::HttpError(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            final_url,
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(FetchedPage {
            url: url_str.to_string(),
            final_url,
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Map a response status to the error taxonomy.
fn check_status(status: StatusCode, url: &str) -> Result<(), Error> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(Error::RequestFailure(format!("status {} for {}", status.as_u16(), url)))
    } else {
        Err(Error::HttpError(format!("status {} for {}", status.as_u16(), url)))
    }
}
