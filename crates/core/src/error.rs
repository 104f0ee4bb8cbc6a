//! Unified error types for url-cache.
//!
//! Display strings carry a stable code prefix so log lines and CLI output
//! can be grepped regardless of the underlying cause.

use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// Unified error type for the cache, its codecs and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No slot in the bucket holds this key.
    #[error("CACHE_MISS: {0}")]
    NotFound(String),

    /// Transient request failure (rate limiting, 5xx, transport error).
    #[error("REQUEST_FAILED: {0}")]
    RequestFailure(String),

    /// A file inside a slot matched no registered codec.
    #[error("CODEC_MISMATCH: no codec matches {}", .0.display())]
    CodecMismatch(PathBuf),

    /// A record field has no registered codec.
    #[error("UNKNOWN_FIELD: no codec registered for field '{0}'")]
    UnknownField(String),

    /// A field value does not have the shape its codec stores.
    #[error("FIELD_TYPE: field '{field}' expects {expected}")]
    FieldType { field: String, expected: &'static str },

    /// A field file exists but could not be decoded.
    #[error("DECODE_FAILED: {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    /// Filesystem operation failed.
    #[error("STORAGE_ERROR: {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Non-retryable HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Content extraction or summarization failed.
    #[error("EXTRACT_FAILED: {0}")]
    ExtractFailed(String),

    /// Invalid configuration.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io { path: path.as_ref().to_path_buf(), source }
    }

    /// Build a decode error for a field file.
    pub fn decode(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Error::Decode { path: path.as_ref().to_path_buf(), reason: reason.to_string() }
    }

    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RequestFailure(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
