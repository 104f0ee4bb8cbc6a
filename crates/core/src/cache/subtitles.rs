//! SubRip (`.srt`) subtitle tracks.
//!
//! Cue times are kept at millisecond precision, which is what the format
//! can express.

use serde::{Deserialize, Serialize};

/// One timed subtitle cue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// Error type for malformed subtitle text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubtitleError {
    #[error("cue {cue}: expected numeric index, found '{found}'")]
    InvalidIndex { cue: usize, found: String },

    #[error("cue {cue}: expected 'start --> end' timing line")]
    MissingTiming { cue: usize },

    #[error("cue {cue}: invalid timestamp '{found}'")]
    InvalidTime { cue: usize, found: String },
}

/// Whether `text` survives a write and re-parse as SubRip cue text.
///
/// Blank lines end a cue, and carriage returns and edge newlines are lost
/// when the file is read back.
pub fn is_representable(text: &str) -> bool {
    !text.contains('\r') && !text.contains("\n\n") && !text.starts_with('\n') && !text.ends_with('\n')
}

/// Render cues in SubRip format.
///
/// Cue text is written as is; callers check it with [`is_representable`].
pub fn to_srt(entries: &[SubtitleEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            entry.index,
            format_time(entry.start_ms),
            format_time(entry.end_ms),
            entry.text
        ));
    }
    out
}

/// Parse SubRip text into cues.
///
/// Blank-line separated blocks of `index`, `start --> end`, then one or more
/// text lines. Accepts `\r\n` line endings and a leading byte-order mark.
pub fn parse_srt(input: &str) -> Result<Vec<SubtitleEntry>, SubtitleError> {
    let normalized = input.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut entries = Vec::new();

    let blocks = normalized
        .split("\n\n")
        .map(|b| b.trim_matches('\n'))
        .filter(|b| !b.is_empty());

    for (cue, block) in blocks.enumerate() {
        let mut lines = block.lines();

        let index_line = lines.next().unwrap_or_default().trim();
        let index = index_line
            .parse::<u32>()
            .map_err(|_| SubtitleError::InvalidIndex { cue, found: index_line.to_string() })?;

        let timing = lines.next().ok_or(SubtitleError::MissingTiming { cue })?;
        let (start, end) = timing.split_once("-->").ok_or(SubtitleError::MissingTiming { cue })?;
        let start_ms = parse_time(start.trim())
            .ok_or_else(|| SubtitleError::InvalidTime { cue, found: start.trim().to_string() })?;
        let end_ms =
            parse_time(end.trim()).ok_or_else(|| SubtitleError::InvalidTime { cue, found: end.trim().to_string() })?;

        let text = lines.collect::<Vec<_>>().join("\n");
        entries.push(SubtitleEntry { index, start_ms, end_ms, text });
    }

    Ok(entries)
}

/// `HH:MM:SS,mmm`
pub fn format_time(ms: u64) -> String {
    let (secs, millis) = (ms / 1000, ms % 1000);
    let (mins, secs) = (secs / 60, secs % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    format!("{hours:02}:{mins:02}:{secs:02},{millis:03}")
}

fn parse_time(s: &str) -> Option<u64> {
    let (hms, millis) = s.split_once([',', '.'])?;
    let mut parts = hms.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let mins: u64 = parts.next()?.parse().ok()?;
    let secs: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || mins >= 60 || secs >= 60 {
        return None;
    }

    // fractional part may be shorter or longer than three digits
    let digits: String = millis.chars().chain(std::iter::repeat('0')).take(3).collect();
    let millis: u64 = digits.parse().ok()?;

    hours
        .checked_mul(60)?
        .checked_add(mins)?
        .checked_mul(60)?
        .checked_add(secs)?
        .checked_mul(1000)?
        .checked_add(millis)
}
