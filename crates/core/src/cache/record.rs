//! The cached record for one key.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use serde_json::Value;

use super::codec::{FieldCodec, FieldValue};

/// Top-level record attributes, in the order they are written.
pub const TOP_LEVEL_FIELDS: [&str; 3] = ["metadata", "timestamp", "html_summary"];

/// Subdirectory of a slot holding extractor-contributed fields.
pub const DATA_DIR: &str = "data";

/// Top-level codecs paired with the field names above.
pub fn top_level_codecs() -> [FieldCodec; 3] {
    [
        FieldCodec::json("metadata"),
        FieldCodec::timestamp("timestamp"),
        FieldCodec::text("html_summary", ".html"),
    ]
}

/// Everything cached for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Canonical key, typically a normalized URL.
    #[serde(rename = "url")]
    pub key: String,
    /// Extractor-contributed fields, keyed by codec name.
    pub data: BTreeMap<String, FieldValue>,
    /// Page metadata; an empty object when nothing was found.
    pub metadata: Value,
    pub html_summary: Option<String>,
    /// When the record was fetched. Whole seconds.
    pub timestamp: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: BTreeMap::new(),
            metadata: Value::Object(Default::default()),
            html_summary: None,
            timestamp: None,
        }
    }

    /// Record stamped with the current time, truncated to what the timestamp file stores.
    pub fn fetched_now(key: impl Into<String>) -> Self {
        Self { timestamp: Some(Utc::now().trunc_subsecs(0)), ..Self::new(key) }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.data.insert(name.into(), value);
        self
    }

    /// Uniform lookup over top-level attributes and `data`. Empty values read as absent.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let value = match name {
            "metadata" => FieldValue::Json(self.metadata.clone()),
            "html_summary" => FieldValue::Text(self.html_summary.clone()?),
            "timestamp" => FieldValue::Timestamp(self.timestamp?),
            other => self.data.get(other)?.clone(),
        };
        (!value.is_empty()).then_some(value)
    }

    /// Set a top-level attribute or a `data` field from a loaded value.
    ///
    /// Returns the value back if a top-level attribute got the wrong shape.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), FieldValue> {
        match (name, value) {
            ("metadata", FieldValue::Json(v)) => self.metadata = v,
            ("html_summary", FieldValue::Text(t)) => self.html_summary = Some(t),
            ("timestamp", FieldValue::Timestamp(t)) => self.timestamp = Some(t),
            (n, v) if TOP_LEVEL_FIELDS.contains(&n) => return Err(v),
            (n, v) => {
                self.data.insert(n.to_string(), v);
            }
        }
        Ok(())
    }

    /// Non-empty top-level attributes, in declaration order.
    pub fn top_level_values(&self) -> Vec<(&'static str, FieldValue)> {
        TOP_LEVEL_FIELDS
            .iter()
            .filter_map(|name| self.field(name).map(|v| (*name, v)))
            .collect()
    }

    /// Non-empty `data` fields.
    pub fn data_values(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.data.iter().filter(|(_, v)| !v.is_empty()).map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of this record with every empty field dropped, i.e. what a store round trip returns.
    pub fn without_empty_fields(&self) -> Self {
        let mut out = Self::new(self.key.clone());
        for (name, value) in self.top_level_values() {
            let _ = out.set_field(name, value);
        }
        for (name, value) in self.data_values() {
            out.data.insert(name.to_string(), value.clone());
        }
        out
    }
}
