//! The cache facade.
//!
//! `UrlCache` normalizes keys through the extractor pipeline, serves stored
//! records, and on a miss (or an expired record) fetches, summarizes,
//! post-processes and stores a fresh one.
//!
//! Nothing here locks the cache directory. Two processes sharing one
//! directory can race when allocating a slot for the same new key; run one
//! process per cache directory or coordinate externally.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::Error;
use crate::cache::{Record, RecordStore};
use crate::config::{AppConfig, CacheOptions, ConfigError};
use crate::fetch::{FetchedPage, Fetcher, Summarizer};
use crate::pipeline::{Extractor, ExtractorContext, ExtractorPipeline};
use crate::retry::RetryPolicy;

/// Subdirectory of the base directory holding the hash buckets.
pub const RECORDS_DIR: &str = "data";

/// Persistent URL cache.
pub struct UrlCache {
    base_dir: PathBuf,
    store: RecordStore,
    pipeline: ExtractorPipeline,
    fetcher: Box<dyn Fetcher>,
    summarizer: Box<dyn Summarizer>,
    options: CacheOptions,
    retry: RetryPolicy,
}

impl UrlCache {
    /// Open (creating if needed) the cache rooted at `base_dir`.
    ///
    /// Records live under `base_dir/data`.
    pub fn open(
        base_dir: impl AsRef<Path>, fetcher: Box<dyn Fetcher>, summarizer: Box<dyn Summarizer>,
        options: CacheOptions,
    ) -> Result<Self, Error> {
        let base_dir = base_dir.as_ref().to_path_buf();
        if base_dir.exists() && !base_dir.is_dir() {
            return Err(ConfigError::NotADirectory(base_dir).into());
        }

        let data_dir = base_dir.join(RECORDS_DIR);
        fs::create_dir_all(&data_dir).map_err(|e| Error::io(&data_dir, e))?;

        let retry = RetryPolicy::new(options.max_retries, Duration::from_secs(1));
        tracing::debug!("opened cache at {}", base_dir.display());

        Ok(Self {
            base_dir,
            store: RecordStore::open(&data_dir)?,
            pipeline: ExtractorPipeline::default(),
            fetcher,
            summarizer,
            options,
            retry,
        })
    }

    /// Open the cache described by `config`.
    pub fn from_config(
        config: &AppConfig, fetcher: Box<dyn Fetcher>, summarizer: Box<dyn Summarizer>,
    ) -> Result<Self, Error> {
        let base_dir = config.resolve_cache_dir()?;
        Self::open(base_dir, fetcher, summarizer, config.cache_options()?)
    }

    /// Replace the backoff policy used around metadata fetches.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Add an extractor after those already registered, along with its codecs.
    pub fn register_extractor(&mut self, extractor: Box<dyn Extractor>) {
        for codec in extractor.codecs() {
            self.store.register_codec(codec);
        }
        self.pipeline.register(extractor);
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Base directory as configured.
    pub fn cache_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the hash buckets.
    pub fn data_dir(&self) -> &Path {
        self.store.dirs().base()
    }

    /// Canonical key for `url`.
    pub fn preprocess(&self, url: &str) -> String {
        self.pipeline.normalize(url)
    }

    /// Cached record for `url`, fetching and storing one when absent or expired.
    pub fn get(&self, url: &str) -> Result<Record, Error> {
        let key = self.preprocess(url);
        match self.store.get(&key) {
            Ok(record) if !self.is_expired(&record, Utc::now()) => {
                tracing::debug!("cache hit for {}", key);
                return Ok(record);
            }
            Ok(record) => {
                tracing::info!(
                    "re-fetching {}, stored {}",
                    key,
                    record.timestamp.map_or_else(|| "without a timestamp".to_string(), |ts| ts.to_rfc3339())
                );
            }
            Err(Error::NotFound(_)) => tracing::debug!("cache miss for {}", key),
            Err(e) => return Err(e),
        }
        self.fetch_and_store(&key)
    }

    /// Fetch `url` again regardless of what is stored.
    pub fn refresh(&self, url: &str) -> Result<Record, Error> {
        let key = self.preprocess(url);
        self.fetch_and_store(&key)
    }

    pub fn in_cache(&self, url: &str) -> Result<bool, Error> {
        self.store.has(&self.preprocess(url))
    }

    /// Slot directory for `url`, if it is cached.
    pub fn get_cache_dir(&self, url: &str) -> Result<Option<PathBuf>, Error> {
        match self.store.dirs().get(&self.preprocess(url)) {
            Ok(path) => Ok(Some(path)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn delete(&self, url: &str) -> Result<bool, Error> {
        self.store.delete(&self.preprocess(url))
    }

    pub fn list_keys(&self) -> Result<Vec<String>, Error> {
        self.store.keys()
    }

    pub fn list_locations(&self) -> Result<Vec<PathBuf>, Error> {
        Ok(self.store.entries()?.into_iter().map(|(_, path)| path).collect())
    }

    /// Every readable stored record. Reads only; nothing is fetched.
    ///
    /// A slot that fails to load is logged and left out of the dump.
    pub fn export(&self) -> Result<Vec<Record>, Error> {
        let mut records = Vec::new();
        for key in self.store.keys()? {
            match self.store.get(&key) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("skipping {} in export: {}", key, e),
            }
        }
        Ok(records)
    }

    /// A record with no timestamp counts as stale whenever an expiry is set.
    fn is_expired(&self, record: &Record, now: DateTime<Utc>) -> bool {
        let Some(expiry) = self.options.expiry else {
            return false;
        };
        match record.timestamp {
            None => true,
            Some(ts) => TimeDelta::from_std(expiry).is_ok_and(|expiry| now - ts > expiry),
        }
    }

    fn fetch_and_store(&self, key: &str) -> Result<Record, Error> {
        let record = self.request_data(key).without_empty_fields();
        self.store.put(key, &record)?;
        Ok(record)
    }

    /// Build a fresh record for `key`. Collaborator failures leave fields absent.
    fn request_data(&self, key: &str) -> Record {
        let mut record = Record::fetched_now(key);

        let page = match self.retry.run(key, || self.fetcher.fetch_metadata(key)) {
            Ok(outcome) => {
                record.metadata = outcome.metadata;
                outcome.page
            }
            Err(e) => {
                tracing::warn!("failed to fetch metadata for {}: {}", key, e);
                None
            }
        };

        let ctx = ExtractorContext { fetcher: self.fetcher.as_ref(), options: &self.options };
        ctx.pause();

        if let Some(page) = page {
            record.html_summary = self.summary_of(page);
        }

        self.pipeline.postprocess(key, record, &ctx)
    }

    fn summary_of(&self, page: FetchedPage) -> Option<String> {
        if page.body.trim().is_empty() || !(page.is_html() || page.content_type.is_none()) {
            tracing::debug!("nothing to summarize for {}", page.url);
            return None;
        }
        if !self.options.summarize_html {
            return Some(page.body);
        }
        match self.summarizer.summarize(&page.body) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!("failed to summarize {}: {}", page.url, e);
                None
            }
        }
    }
}
