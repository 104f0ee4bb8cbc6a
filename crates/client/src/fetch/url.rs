//! URL parsing for outbound requests and site matching.

use url::Url;

/// Error type for request URL failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse a cache key into a URL that can be requested.
///
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Only http and https are accepted
/// 4. Remove fragment (#...)
///
/// The key itself is left untouched; this only shapes the request.
pub fn request_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = parse_lenient(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);
    Ok(parsed)
}

/// Parse `input`, assuming `https://` when it has no scheme.
pub fn parse_lenient(input: &str) -> Result<Url, url::ParseError> {
    if input.contains("://") { Url::parse(input) } else { Url::parse(&format!("https://{input}")) }
}

/// Lowercased host of `url`, without a leading `www.`.
pub fn bare_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.to_lowercase())
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
}
