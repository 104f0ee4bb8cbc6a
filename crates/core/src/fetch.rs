//! Collaborator boundaries for network access and summarization.
//!
//! The cache never talks to the network itself. A [`Fetcher`] returns page
//! metadata together with the raw response it was parsed from, so the
//! summarizer can reuse the body without a second request.

use serde_json::Value;

use crate::Error;

/// A completed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// The URL requested.
    pub url: String,
    /// The URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Response body decoded as text.
    pub body: String,
}

impl FetchedPage {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
    }
}

/// Result of a metadata fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Structured page metadata; an empty object when nothing was found.
    pub metadata: Value,
    /// The response the metadata was extracted from, when there was one.
    pub page: Option<FetchedPage>,
}

/// Network access used by the cache and by extractors.
///
/// Implementations report rate limiting and other transient failures as
/// `Error::RequestFailure` so callers can retry them.
pub trait Fetcher {
    /// Fetch `url` and extract its metadata.
    fn fetch_metadata(&self, url: &str) -> Result<FetchOutcome, Error>;

    /// Plain GET, for extractors' follow-up requests.
    fn get(&self, url: &str) -> Result<FetchedPage, Error>;
}

/// Reduces a page of HTML to its readable content.
pub trait Summarizer {
    /// Summarize `html`. Blank input is an error.
    fn summarize(&self, html: &str) -> Result<String, Error>;
}
