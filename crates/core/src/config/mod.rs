//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Explicit overrides (command-line flags)
//! 2. Environment variables (URL_CACHE_*)
//! 3. TOML config file (if URL_CACHE_CONFIG_FILE set)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod duration;
mod validation;

pub use duration::parse_duration;
pub use validation::ConfigError;

/// Name of the per-user data directory used when nothing else is configured.
pub const APP_DIR_NAME: &str = "url_cache";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Overrides passed to [`AppConfig::load_with`]
/// 2. Environment variables (URL_CACHE_*)
/// 3. TOML file from `URL_CACHE_CONFIG_FILE` (if set)
/// 4. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base cache directory; records live under its `data/` subdirectory.
    ///
    /// Set via URL_CACHE_DIR environment variable. Defaults to the
    /// platform user data directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Seconds to sleep after each outbound request.
    ///
    /// Set via URL_CACHE_SLEEP_TIME_SECS environment variable.
    #[serde(default = "default_sleep_time_secs")]
    pub sleep_time_secs: u64,

    /// Re-fetch records older than this, e.g. `5d` or `1w2d8h5m20s`.
    ///
    /// Set via URL_CACHE_EXPIRY environment variable.
    #[serde(default)]
    pub expiry: Option<String>,

    /// Summarize fetched HTML with readability; when false the raw page is stored.
    ///
    /// Set via URL_CACHE_SUMMARIZE_HTML environment variable.
    #[serde(default = "default_true")]
    pub summarize_html: bool,

    /// Skip downloading YouTube subtitles.
    ///
    /// Set via URL_CACHE_SKIP_SUBTITLES environment variable.
    #[serde(default)]
    pub skip_subtitles: bool,

    /// Language code of the subtitle track to download.
    ///
    /// Set via URL_CACHE_SUBTITLE_LANGUAGE environment variable.
    #[serde(default = "default_subtitle_language")]
    pub subtitle_language: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via URL_CACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via URL_CACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts made for a metadata fetch before giving up.
    ///
    /// Set via URL_CACHE_MAX_RETRIES environment variable.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_sleep_time_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

pub(crate) fn default_subtitle_language() -> String {
    "en".into()
}

fn default_user_agent() -> String {
    concat!("url-cache/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            sleep_time_secs: default_sleep_time_secs(),
            expiry: None,
            summarize_html: true,
            skip_subtitles: false,
            subtitle_language: default_subtitle_language(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// Runtime options consumed by the cache facade and its extractors.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Blocking pause after each outbound request.
    pub sleep_time: Duration,
    /// Records older than this are re-fetched on `get`.
    pub expiry: Option<Duration>,
    pub summarize_html: bool,
    pub skip_subtitles: bool,
    pub subtitle_language: String,
    pub max_retries: u32,
}

impl Default for CacheOptions {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            sleep_time: config.sleep_time(),
            expiry: None,
            summarize_html: config.summarize_html,
            skip_subtitles: config.skip_subtitles,
            subtitle_language: config.subtitle_language,
            max_retries: config.max_retries,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sleep_time(&self) -> Duration {
        Duration::from_secs(self.sleep_time_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Load configuration with `overrides` layered on top of every other source.
    ///
    /// `overrides` should skip serializing unset fields so they do not mask
    /// lower layers.
    pub fn load_with<T: Serialize>(overrides: T) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment().merge(Serialized::defaults(overrides)))
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("URL_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(Env::prefixed("URL_CACHE_").map(|key| match key.as_str() {
            // URL_CACHE_DIR predates the other variables
            "DIR" | "dir" => "cache_dir".into(),
            other => other.to_lowercase().into(),
        }))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the base cache directory.
    ///
    /// Uses `cache_dir` when set, else `<user data dir>/url_cache`. The path
    /// is `~`-expanded and made absolute but not created.
    pub fn resolve_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.cache_dir {
            Some(dir) => expand_home(dir),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR_NAME))
                .ok_or_else(|| ConfigError::Invalid {
                    field: "cache_dir".into(),
                    reason: "no user data directory on this platform; set URL_CACHE_DIR".into(),
                })?,
        };

        let dir = std::path::absolute(&dir).map_err(|e| ConfigError::Invalid {
            field: "cache_dir".into(),
            reason: format!("cannot resolve '{}': {e}", dir.display()),
        })?;

        if dir.exists() && !dir.is_dir() {
            return Err(ConfigError::NotADirectory(dir));
        }
        Ok(dir)
    }

    /// Runtime options for the cache facade.
    pub fn cache_options(&self) -> Result<CacheOptions, ConfigError> {
        let expiry = self.expiry.as_deref().map(parse_duration).transpose()?;
        Ok(CacheOptions {
            sleep_time: self.sleep_time(),
            expiry,
            summarize_html: self.summarize_html,
            skip_subtitles: self.skip_subtitles,
            subtitle_language: self.subtitle_language.clone(),
            max_retries: self.max_retries,
        })
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
