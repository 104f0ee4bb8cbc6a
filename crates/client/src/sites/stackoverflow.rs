//! StackOverflow question URLs.

use urlcache_core::Extractor;

use crate::fetch::{bare_host, parse_lenient};

/// Collapses the many StackOverflow question URL shapes onto `/questions/<id>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackOverflow;

impl StackOverflow {
    /// Numeric question id from `/q/<id>` or `/questions/<id>/<slug>`.
    pub fn question_id(url: &str) -> Option<u64> {
        let parsed = parse_lenient(url).ok()?;
        if !bare_host(&parsed).is_some_and(|h| h == "stackoverflow.com") {
            return None;
        }
        let mut segments = parsed.path_segments()?;
        match segments.next()? {
            "q" | "questions" => segments.next()?.parse().ok(),
            _ => None,
        }
    }
}

impl Extractor for StackOverflow {
    fn name(&self) -> &str {
        "stackoverflow"
    }

    fn recognizes(&self, url: &str) -> bool {
        Self::question_id(url).is_some()
    }

    fn normalize(&self, url: &str) -> String {
        match Self::question_id(url) {
            Some(id) => format!("https://stackoverflow.com/questions/{id}"),
            None => url.to_string(),
        }
    }
}
