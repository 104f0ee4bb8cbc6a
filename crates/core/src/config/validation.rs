//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use std::path::PathBuf;

use crate::config::{AppConfig, parse_duration};
use thiserror::Error;

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("cache directory '{}' exists but is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("could not parse duration from '{0}'; valid examples: '8h', '1w2d8h5m20s', '2m4s'")]
    InvalidDuration(String),
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `user_agent` is empty
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_retries` is 0
    /// - `subtitle_language` is empty
    ///
    /// Returns `ConfigError::InvalidDuration` if `expiry` does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_retries == 0 {
            return Err(ConfigError::Invalid { field: "max_retries".into(), reason: "must be at least 1".into() });
        }

        if self.subtitle_language.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "subtitle_language".into(),
                reason: "must not be empty".into(),
            });
        }

        if let Some(expiry) = &self.expiry {
            parse_duration(expiry)?;
        }

        if self.skip_subtitles && self.subtitle_language != super::default_subtitle_language() {
            tracing::warn!(
                subtitle_language = %self.subtitle_language,
                "subtitle_language is set but skip_subtitles disables subtitle downloads"
            );
        }

        Ok(())
    }
}
