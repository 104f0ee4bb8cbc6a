//! Core types and shared functionality for url-cache.
//!
//! This crate provides:
//! - The content-addressed directory cache and its field codecs
//! - The extractor pipeline and the `UrlCache` facade
//! - Collaborator traits for fetching and summarizing
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod facade;
pub mod fetch;
pub mod pipeline;
pub mod retry;

pub use cache::{FieldCodec, FieldValue, Record, RecordStore, SubtitleEntry};
pub use config::{AppConfig, CacheOptions, ConfigError};
pub use error::Error;
pub use facade::UrlCache;
pub use fetch::{FetchOutcome, FetchedPage, Fetcher, Summarizer};
pub use pipeline::{Extractor, ExtractorContext, ExtractorPipeline};
pub use retry::RetryPolicy;
