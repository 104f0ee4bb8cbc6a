//! YouTube videos: canonical watch URLs and subtitle tracks.
//!
//! Subtitles are found by reading the `captionTracks` list embedded in the
//! watch page, then downloading the timed-text XML for the requested
//! language and converting it to SubRip cues.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use urlcache_core::cache::{FieldCodec, FieldValue, SubtitleEntry};
use urlcache_core::{Error, Extractor, ExtractorContext, Record};

use crate::fetch::{bare_host, parse_lenient};

/// Field holding the downloaded subtitle track.
pub const SUBTITLES_FIELD: &str = "subtitles";

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("invalid regex"));
static TIMED_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<text start="([\d.]+)"(?: dur="([\d.]+)")?[^>]*>(.*?)</text>"#).expect("invalid regex")
});

/// Error type for subtitle downloads.
#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("request failed: {0}")]
    Request(#[from] Error),

    #[error("no caption tracks; the video may have no subtitles or may be licensed")]
    NoCaptions,

    #[error("no caption track for language '{0}'")]
    NoTrack(String),

    #[error("malformed caption data: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

/// YouTube extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct YouTube;

impl YouTube {
    /// Video id from any of the common URL shapes.
    ///
    /// Accepts `youtube.com/watch?v=`, `/embed/`, `/v/` and `youtu.be/`
    /// forms, with or without a scheme.
    pub fn video_id(url: &str) -> Option<String> {
        let parsed = parse_lenient(url).ok()?;
        let host = bare_host(&parsed)?;

        let youtube =
            is_domain_or_subdomain(&host, "youtube.com") || is_domain_or_subdomain(&host, "youtube-nocookie.com");
        let id = if youtube {
            let mut segments = parsed.path_segments()?;
            match segments.next()? {
                "watch" => parsed.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v.into_owned()),
                "embed" | "v" => segments.next().map(str::to_string),
                _ => None,
            }
        } else if host == "youtu.be" {
            parsed.path_segments()?.next().map(str::to_string)
        } else {
            None
        }?;

        VIDEO_ID.is_match(&id).then_some(id)
    }

    fn download_subtitles(
        &self, id: &str, language: &str, ctx: &ExtractorContext<'_>,
    ) -> Result<Vec<SubtitleEntry>, CaptionError> {
        let watch = ctx.fetcher.get(&watch_url(id));
        ctx.pause();
        let tracks = caption_tracks(&watch?.body)?;

        let track = select_track(&tracks, language).ok_or_else(|| CaptionError::NoTrack(language.to_string()))?;
        tracing::debug!("downloading {} subtitles for {}", track.language_code, id);

        let timed_text = ctx.fetcher.get(&track.base_url);
        ctx.pause();
        Ok(parse_timed_text(&timed_text?.body))
    }
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

impl Extractor for YouTube {
    fn name(&self) -> &str {
        "youtube"
    }

    fn recognizes(&self, url: &str) -> bool {
        Self::video_id(url).is_some()
    }

    fn normalize(&self, url: &str) -> String {
        Self::video_id(url).map_or_else(|| url.to_string(), |id| watch_url(&id))
    }

    /// Drop the generic page summary and attach subtitles when available.
    fn postprocess(&self, url: &str, mut record: Record, ctx: &ExtractorContext<'_>) -> Result<Record, Error> {
        record.html_summary = None;

        if ctx.options.skip_subtitles {
            return Ok(record);
        }
        let Some(id) = Self::video_id(url) else {
            return Ok(record);
        };

        match self.download_subtitles(&id, &ctx.options.subtitle_language, ctx) {
            Ok(entries) if !entries.is_empty() => {
                record.data.insert(SUBTITLES_FIELD.into(), FieldValue::Subtitles(entries));
            }
            Ok(_) => tracing::debug!("subtitle track for {} is empty", id),
            Err(e) => tracing::debug!("no subtitles for {}: {}", id, e),
        }
        Ok(record)
    }

    fn codecs(&self) -> Vec<FieldCodec> {
        vec![FieldCodec::subtitles(SUBTITLES_FIELD)]
    }
}

/// The `captionTracks` array embedded in a watch page.
fn caption_tracks(page: &str) -> Result<Vec<CaptionTrack>, CaptionError> {
    const MARKER: &str = "\"captionTracks\":";
    let start = page.find(MARKER).ok_or(CaptionError::NoCaptions)? + MARKER.len();
    let array =
        json_array_at(&page[start..]).ok_or_else(|| CaptionError::Malformed("unterminated captionTracks".into()))?;
    let tracks: Vec<CaptionTrack> = serde_json::from_str(array).map_err(|e| CaptionError::Malformed(e.to_string()))?;
    if tracks.is_empty() {
        return Err(CaptionError::NoCaptions);
    }
    Ok(tracks)
}

fn is_domain_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain || host.strip_suffix(domain).is_some_and(|rest| rest.ends_with('.'))
}

/// Slice of the JSON array opening at the start of `input`.
fn json_array_at(input: &str) -> Option<&str> {
    let input = input.trim_start();
    if !input.starts_with('[') {
        return None;
    }
    let (mut depth, mut in_string, mut escaped) = (0usize, false, false);
    for (i, c) in input.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&input[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Uploaded tracks win over auto-generated ones for the same language.
fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let mut matching = tracks.iter().filter(|t| t.language_code == language);
    let first = matching.clone().next();
    matching.find(|t| t.kind.as_deref() != Some("asr")).or(first)
}

/// Convert YouTube timed-text XML into numbered cues.
fn parse_timed_text(xml: &str) -> Vec<SubtitleEntry> {
    TIMED_TEXT
        .captures_iter(xml)
        .filter_map(|caps| {
            let start: f64 = caps[1].parse().ok()?;
            let duration: f64 = caps.get(2).map_or(Some(0.0), |d| d.as_str().parse().ok())?;
            let text = decode_entities(&caps[3]);
            Some((start, duration, text))
        })
        .filter(|(_, _, text)| !text.is_empty())
        .enumerate()
        .map(|(i, (start, duration, text))| SubtitleEntry {
            index: i as u32 + 1,
            start_ms: seconds_to_ms(start),
            end_ms: seconds_to_ms(start + duration),
            text,
        })
        .collect()
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds * 1000.0).round() as u64
}

/// Caption text is entity-escaped once by the XML and often again by YouTube.
fn decode_entities(raw: &str) -> String {
    let mut text = fragment_text(raw);
    if text.contains('&') {
        text = fragment_text(&text);
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fragment_text(html: &str) -> String {
    Html::parse_fragment(html).root_element().text().collect()
}
