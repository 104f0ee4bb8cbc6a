//! Site extractor pipeline.
//!
//! Extractors are consulted in registration order. Every extractor normalizes
//! every key before lookup, so equivalent URLs collapse to one canonical key
//! before hashing. After a fresh fetch, each extractor that recognizes the
//! key may rewrite the record. Extractor failures are logged and never fail
//! the surrounding lookup.

use std::thread;

use percent_encoding::percent_decode_str;

use crate::Error;
use crate::cache::{FieldCodec, Record};
use crate::config::CacheOptions;
use crate::fetch::Fetcher;

/// What an extractor can reach while post-processing a record.
pub struct ExtractorContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub options: &'a CacheOptions,
}

impl ExtractorContext<'_> {
    /// Blocking inter-request delay; call after every outbound request.
    pub fn pause(&self) {
        if !self.options.sleep_time.is_zero() {
            thread::sleep(self.options.sleep_time);
        }
    }
}

/// A site-specific plugin.
pub trait Extractor {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Whether this extractor handles `url`.
    fn recognizes(&self, url: &str) -> bool;

    /// Rewrite `url` to its canonical form. Unrecognized URLs pass through unchanged.
    fn normalize(&self, url: &str) -> String {
        url.to_string()
    }

    /// Enrich or trim a freshly fetched record.
    fn postprocess(&self, _url: &str, record: Record, _ctx: &ExtractorContext<'_>) -> Result<Record, Error> {
        Ok(record)
    }

    /// Codecs for the fields this extractor adds.
    fn codecs(&self) -> Vec<FieldCodec> {
        Vec::new()
    }
}

/// Ordered extractor set.
#[derive(Default)]
pub struct ExtractorPipeline {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorPipeline {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        tracing::debug!("registered extractor {}", extractor.name());
        self.extractors.push(extractor);
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Codecs contributed by every extractor.
    pub fn codecs(&self) -> Vec<FieldCodec> {
        self.extractors.iter().flat_map(|e| e.codecs()).collect()
    }

    /// Percent-decode and trim `url`, then apply every extractor's normalization in order.
    pub fn normalize(&self, url: &str) -> String {
        self.extractors
            .iter()
            .fold(clean_url(url), |acc, extractor| extractor.normalize(&acc))
    }

    /// Run every recognizing extractor over `record`.
    ///
    /// A failing extractor is logged and its changes discarded; the record as
    /// it was before that extractor continues down the pipeline.
    pub fn postprocess(&self, url: &str, mut record: Record, ctx: &ExtractorContext<'_>) -> Record {
        for extractor in self.extractors.iter().filter(|e| e.recognizes(url)) {
            match extractor.postprocess(url, record.clone(), ctx) {
                Ok(updated) => record = updated,
                Err(e) => tracing::warn!("extractor {} failed for {}: {}", extractor.name(), url, e),
            }
        }
        record
    }
}

/// Unquote percent-escapes and strip surrounding whitespace.
pub fn clean_url(url: &str) -> String {
    percent_decode_str(url).decode_utf8_lossy().trim().to_string()
}
