//! Field codecs: one named record attribute per file.
//!
//! A codec matches files by name prefix and suffix rather than by extension,
//! so compound suffixes such as `.datetime.txt` can describe the encoding and
//! several codecs can share one directory.

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::record::top_level_codecs;
use super::subtitles::{SubtitleEntry, is_representable, parse_srt, to_srt};
use crate::Error;

/// In-memory value of one record field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Json(Value),
    Text(String),
    Subtitles(Vec<SubtitleEntry>),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Empty values are never written; a field file on disk means data was found.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Json(Value::Null) => true,
            FieldValue::Json(Value::Object(map)) => map.is_empty(),
            FieldValue::Json(_) => false,
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::Subtitles(entries) => entries.is_empty(),
            FieldValue::Timestamp(_) => false,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FieldValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_subtitles(&self) -> Option<&[SubtitleEntry]> {
        match self {
            FieldValue::Subtitles(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

/// On-disk encoding of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    /// Structured JSON document.
    Json,
    /// Raw UTF-8 text.
    Text,
    /// Decimal epoch seconds.
    Timestamp,
    /// SubRip subtitle track.
    Subtitles,
}

impl FieldFormat {
    fn describe(self) -> &'static str {
        match self {
            FieldFormat::Json => "a JSON value",
            FieldFormat::Text => "text",
            FieldFormat::Timestamp => "a timestamp",
            FieldFormat::Subtitles => "a subtitle track",
        }
    }
}

/// Declarative mapping from a field name to its file and encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCodec {
    name: String,
    suffix: String,
    format: FieldFormat,
}

impl FieldCodec {
    pub fn new(name: impl Into<String>, suffix: impl Into<String>, format: FieldFormat) -> Self {
        Self { name: name.into(), suffix: suffix.into(), format }
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, ".json", FieldFormat::Json)
    }

    pub fn text(name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::new(name, suffix, FieldFormat::Text)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, ".datetime.txt", FieldFormat::Timestamp)
    }

    pub fn subtitles(name: impl Into<String>) -> Self {
        Self::new(name, ".srt", FieldFormat::Subtitles)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> FieldFormat {
        self.format
    }

    /// File name this codec writes.
    pub fn filename(&self) -> String {
        format!("{}{}", self.name, self.suffix)
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.name) && file_name.ends_with(&self.suffix)
    }

    pub fn load(&self, path: &Path) -> Result<FieldValue, Error> {
        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        match self.format {
            FieldFormat::Json => {
                let value = serde_json::from_str(&contents).map_err(|e| Error::decode(path, e))?;
                Ok(FieldValue::Json(value))
            }
            FieldFormat::Text => Ok(FieldValue::Text(contents)),
            FieldFormat::Timestamp => parse_epoch(contents.trim())
                .map(FieldValue::Timestamp)
                .ok_or_else(|| Error::decode(path, format!("invalid timestamp '{}'", contents.trim()))),
            FieldFormat::Subtitles => {
                let entries = parse_srt(&contents).map_err(|e| Error::decode(path, e))?;
                Ok(FieldValue::Subtitles(entries))
            }
        }
    }

    /// Serialize `value`. Returns `None` for empty values, which must not be written.
    pub fn encode(&self, value: &FieldValue) -> Result<Option<String>, Error> {
        if value.is_empty() {
            return Ok(None);
        }
        let encoded = match (self.format, value) {
            (FieldFormat::Json, FieldValue::Json(v)) => {
                serde_json::to_string(v).map_err(|e| Error::ExtractFailed(format!("serialize {}: {e}", self.name)))?
            }
            (FieldFormat::Text, FieldValue::Text(t)) => t.clone(),
            (FieldFormat::Timestamp, FieldValue::Timestamp(t)) => t.timestamp().to_string(),
            (FieldFormat::Subtitles, FieldValue::Subtitles(entries)) => {
                if !entries.iter().all(|e| is_representable(&e.text)) {
                    return Err(Error::FieldType {
                        field: self.name.clone(),
                        expected: "cue text without blank lines, edge newlines or carriage returns",
                    });
                }
                to_srt(entries)
            }
            _ => return Err(Error::FieldType { field: self.name.clone(), expected: self.format.describe() }),
        };
        Ok(Some(encoded))
    }
}

/// Accepts epoch seconds, or an ISO-8601 instant for hand-edited files.
fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Ordered set of codecs. The first codec matching a file name wins.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: Vec<FieldCodec>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self { codecs: top_level_codecs().to_vec() }
    }
}

impl CodecRegistry {
    /// Add a codec. Re-registering an identical codec is a no-op.
    pub fn register(&mut self, codec: FieldCodec) {
        if self.codecs.contains(&codec) {
            return;
        }
        if self.by_name(codec.name()).is_some() {
            tracing::warn!("codec for field '{}' registered twice; first registration wins", codec.name());
        }
        self.codecs.push(codec);
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldCodec> {
        self.codecs.iter().find(|c| c.name == name)
    }

    /// Codec for a file found on disk, or `CodecMismatch`.
    pub fn for_file(&self, path: &Path) -> Result<&FieldCodec, Error> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.codecs
            .iter()
            .find(|c| c.matches(file_name))
            .ok_or_else(|| Error::CodecMismatch(path.to_path_buf()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldCodec> {
        self.codecs.iter()
    }
}
