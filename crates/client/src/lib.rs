//! Client code for url-cache.
//!
//! This crate provides the network-facing collaborators of the cache: the
//! blocking HTTP fetcher, metadata scraping, readability summaries and the
//! built-in site extractors.

pub mod extract;
pub mod fetch;
pub mod sites;

pub use extract::{LectitoSummarizer, SummaryConfig, html_metadata, page_metadata};
pub use fetch::{FetchConfig, HttpFetcher};
pub use sites::{MyAnimeList, StackOverflow, YouTube, default_extractors};
