//! Readable content extraction and page metadata.
//!
//! ### Summaries
//! - Uses Lectito's extraction pipeline (Readability.js-inspired).
//! - Preprocessing, scoring, best-candidate selection, and cleanup.
//! - The stored summary is the cleaned article HTML, not Markdown.
//!
//! ### Metadata
//! - Head tags (`<title>`, OpenGraph, Twitter cards, canonical link) via scraper.

pub mod metadata;

pub use metadata::{html_metadata, page_metadata};

use lectito_core::{Document, ExtractConfig as LectitoConfig};
use urlcache_core::{Error, Summarizer};

/// Configuration for readability extraction.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Minimum character count for content (default: 200)
    pub char_threshold: Option<usize>,

    /// Maximum number of top candidates to consider (default: 5)
    pub max_top_candidates: Option<usize>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { char_threshold: Some(200), max_top_candidates: Some(5) }
    }
}

impl SummaryConfig {
    /// Convert to Lectito's config type.
    fn to_lectito_config(&self) -> LectitoConfig {
        let mut cfg = LectitoConfig::default();
        if let Some(threshold) = self.char_threshold {
            cfg.char_threshold = threshold;
        }
        if let Some(max) = self.max_top_candidates {
            cfg.max_top_candidates = max;
        }
        cfg
    }
}

/// Lectito-based summarizer.
#[derive(Debug, Clone, Default)]
pub struct LectitoSummarizer {
    config: SummaryConfig,
}

impl LectitoSummarizer {
    pub fn new(config: SummaryConfig) -> Self {
        Self { config }
    }
}

impl Summarizer for LectitoSummarizer {
    fn summarize(&self, html: &str) -> Result<String, Error> {
        if html.trim().is_empty() {
            return Err(Error::ExtractFailed("nothing to summarize".into()));
        }

        let doc = Document::parse(html).map_err(|e| Error::ExtractFailed(format!("failed to parse HTML: {}", e)))?;
        let extracted = lectito_core::extract_content(&doc, &self.config.to_lectito_config())
            .map_err(|e| Error::ExtractFailed(format!("extraction failed: {}", e)))?;

        let summary = extracted.content.to_string();
        if summary.trim().is_empty() {
            return Err(Error::ExtractFailed("extraction produced no content".into()));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"
        <!DOCTYPE html>
        <html>
        <head><title>Test Page</title></head>
        <body>
            <nav><a href="/">Home</a></nav>
            <article>
                <h1>Main Content</h1>
                <p>This is a substantial paragraph with plenty of content to ensure we meet
                the character threshold for extraction. We need multiple paragraphs with
                meaningful content to pass the extraction algorithm's requirements.</p>
                <p>Here is another paragraph with even more content to ensure that the
                extraction will succeed. This paragraph adds more text and increases the
                overall character count significantly.</p>
                <p>A third paragraph providing additional content that helps ensure the
                document is substantial enough for successful extraction. The readability
                algorithm requires a minimum amount of content to identify the main article.</p>
            </article>
        </body>
        </html>
    "#;

    #[test]
    fn test_summary_config_default() {
        let config = SummaryConfig::default();
        assert_eq!(config.char_threshold, Some(200));
        assert_eq!(config.max_top_candidates, Some(5));
    }

    #[test]
    fn test_summary_custom_config() {
        let config = SummaryConfig { char_threshold: Some(100), max_top_candidates: Some(3) };
        let lectito_cfg = config.to_lectito_config();
        assert_eq!(lectito_cfg.char_threshold, 100);
        assert_eq!(lectito_cfg.max_top_candidates, 3);
    }

    #[test]
    fn test_summarize_article() {
        let summary = LectitoSummarizer::default().summarize(ARTICLE).unwrap();
        assert!(summary.contains("substantial paragraph"));
    }

    #[test]
    fn test_summarize_blank() {
        let result = LectitoSummarizer::default().summarize("  \n ");
        assert!(matches!(result, Err(Error::ExtractFailed(_))));
    }

    #[test]
    fn test_summarize_invalid_html() {
        assert!(LectitoSummarizer::default().summarize("not really html").is_err());
    }
}
