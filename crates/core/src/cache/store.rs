//! Record persistence on top of the hash directory store.
//!
//! Each non-empty field is one file in the key's slot: top-level attributes
//! directly in the slot, extractor fields under `data/`. Writing a record
//! replaces the slot's previous fields instead of merging with them.

use std::fs;
use std::path::{Path, PathBuf};

use super::codec::{CodecRegistry, FieldCodec};
use super::dir::{HashDirStore, KEY_FILE};
use super::record::{DATA_DIR, Record};
use crate::Error;

/// Files in a slot that are not fields.
const IGNORED_FILES: &[&str] = &[KEY_FILE, "url.txt"];

/// Suffix of the temporary file a field is written to before being renamed into place.
const PARTIAL_SUFFIX: &str = ".partial";

/// Structured record store.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dirs: HashDirStore,
    codecs: CodecRegistry,
}

impl RecordStore {
    /// Open a store rooted at `base` with the built-in codecs.
    pub fn open(base: impl AsRef<Path>) -> Result<Self, Error> {
        Self::with_codecs(base, CodecRegistry::default())
    }

    pub fn with_codecs(base: impl AsRef<Path>, codecs: CodecRegistry) -> Result<Self, Error> {
        Ok(Self { dirs: HashDirStore::open(base)?, codecs })
    }

    pub fn register_codec(&mut self, codec: FieldCodec) {
        self.codecs.register(codec);
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn dirs(&self) -> &HashDirStore {
        &self.dirs
    }

    /// Load the record stored for `key`.
    ///
    /// Fails with `NotFound` on a miss and with `CodecMismatch` if the slot
    /// holds a file no codec recognizes.
    pub fn get(&self, key: &str) -> Result<Record, Error> {
        let slot = self.dirs.get(key)?;
        let mut record = Record::new(key);

        for path in field_files(&slot)? {
            let codec = self.codecs.for_file(&path)?;
            let value = codec.load(&path)?;
            record.set_field(codec.name(), value).map_err(|_| Error::FieldType {
                field: codec.name().to_string(),
                expected: "the top-level attribute's type",
            })?;
        }

        Ok(record)
    }

    /// Store `record` under `key`, replacing whatever was stored before.
    ///
    /// Every field is encoded and written to a `.partial` file before the
    /// previous fields are removed. A failed write removes the partial files
    /// and leaves the existing record untouched.
    pub fn put(&self, key: &str, record: &Record) -> Result<PathBuf, Error> {
        let mut writes: Vec<(PathBuf, String)> = Vec::new();

        for (name, value) in record.top_level_values() {
            let codec = self.codec(name)?;
            if let Some(encoded) = codec.encode(&value)? {
                writes.push((PathBuf::from(codec.filename()), encoded));
            }
        }
        for (name, value) in record.data_values() {
            let codec = self.codec(name)?;
            if let Some(encoded) = codec.encode(value)? {
                writes.push((Path::new(DATA_DIR).join(codec.filename()), encoded));
            }
        }

        let slot = self.dirs.put(key)?;
        let staged = stage_writes(&slot, writes)?;

        let committed = clear_fields(&slot, &staged).and_then(|()| {
            staged
                .iter()
                .try_for_each(|(partial, path)| fs::rename(partial, path).map_err(|e| Error::io(path, e)))
        });
        if let Err(e) = committed {
            remove_partials(&staged);
            return Err(e);
        }

        tracing::debug!("stored {} at {}", key, slot.display());
        Ok(slot)
    }

    pub fn has(&self, key: &str) -> Result<bool, Error> {
        self.dirs.exists(key)
    }

    pub fn delete(&self, key: &str) -> Result<bool, Error> {
        self.dirs.delete(key)
    }

    /// Every stored key, in bucket order.
    pub fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.dirs.slots()?.into_iter().map(|s| s.key).collect())
    }

    /// Every stored key with its slot directory.
    pub fn entries(&self) -> Result<Vec<(String, PathBuf)>, Error> {
        Ok(self.dirs.slots()?.into_iter().map(|s| (s.key, s.path)).collect())
    }

    fn codec(&self, name: &str) -> Result<&FieldCodec, Error> {
        self.codecs
            .by_name(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }
}

/// All field files under a slot, recursively, sorted by path.
fn field_files(slot: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    let mut pending = vec![slot.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))? {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if !IGNORED_FILES.iter().any(|name| entry.file_name() == *name) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Write every field to its `.partial` file, returning `(partial, target)` pairs.
///
/// On failure every partial written so far is removed.
fn stage_writes(slot: &Path, writes: Vec<(PathBuf, String)>) -> Result<Vec<(PathBuf, PathBuf)>, Error> {
    let mut staged = Vec::with_capacity(writes.len());

    for (relative, contents) in writes {
        let path = slot.join(relative);
        let partial = partial_path(&path);
        let written = match path.parent() {
            Some(parent) => fs::create_dir_all(parent).map_err(|e| Error::io(parent, e)),
            None => Ok(()),
        }
        .and_then(|()| fs::write(&partial, contents).map_err(|e| Error::io(&partial, e)));

        if let Err(e) = written {
            tracing::warn!("failed to stage {}: {}", partial.display(), e);
            let _ = fs::remove_file(&partial);
            remove_partials(&staged);
            remove_empty_dirs(slot);
            return Err(e);
        }
        staged.push((partial, path));
    }

    Ok(staged)
}

fn remove_partials(staged: &[(PathBuf, PathBuf)]) {
    for (partial, _) in staged {
        if let Err(e) = fs::remove_file(partial)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("failed to remove {}: {}", partial.display(), e);
        }
    }
}

/// Remove every file in a slot except its key file and the staged partials,
/// then any directories left empty.
fn clear_fields(slot: &Path, staged: &[(PathBuf, PathBuf)]) -> Result<(), Error> {
    let mut pending = vec![slot.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))? {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if path != slot.join(KEY_FILE) && !staged.iter().any(|(partial, _)| *partial == path) {
                fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            }
        }
    }

    remove_empty_dirs(slot);
    Ok(())
}

/// Remove empty subdirectories of a slot, deepest first.
fn remove_empty_dirs(slot: &Path) {
    let Ok(entries) = fs::read_dir(slot) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            remove_empty_dirs(&path);
            // fails unless empty
            let _ = fs::remove_dir(&path);
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    path.with_file_name(format!("{file_name}{PARTIAL_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::codec::FieldValue;
    use crate::cache::subtitles::{SubtitleEntry, is_representable};
    use chrono::DateTime;
    use proptest::prelude::*;
    use serde_json::{Map, Value, json};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, RecordStore) {
        let tmp = TempDir::new().unwrap();
        let mut store = RecordStore::open(tmp.path()).unwrap();
        store.register_codec(FieldCodec::subtitles("subtitles"));
        store.register_codec(FieldCodec::json("jikan"));
        (tmp, store)
    }

    fn full_record(key: &str) -> Record {
        let mut record = Record::new(key)
            .with_metadata(json!({"title": "A", "images": [{"src": "x.png", "type": "body_image"}]}))
            .with_field(
                "subtitles",
                FieldValue::Subtitles(vec![SubtitleEntry { index: 1, start_ms: 0, end_ms: 1200, text: "hi".into() }]),
            );
        record.html_summary = Some("<div><p>Body</p></div>".into());
        record.timestamp = DateTime::from_timestamp(1_700_000_000, 0);
        record
    }

    #[test]
    fn test_round_trip() {
        let (_tmp, store) = open_store();
        let record = full_record("https://example.com/a");
        store.put("https://example.com/a", &record).unwrap();
        assert_eq!(store.get("https://example.com/a").unwrap(), record);
    }

    #[test]
    fn test_file_layout() {
        let (_tmp, store) = open_store();
        let slot = store.put("https://example.com/a", &full_record("https://example.com/a")).unwrap();
        assert!(slot.ends_with("000"));
        assert!(slot.join("key").is_file());
        assert!(slot.join("metadata.json").is_file());
        assert!(slot.join("html_summary.html").is_file());
        assert_eq!(fs::read_to_string(slot.join("timestamp.datetime.txt")).unwrap(), "1700000000");
        assert!(slot.join("data").join("subtitles.srt").is_file());
        assert!(!slot.join("url.txt").exists());
    }

    #[test]
    fn test_metadata_only_writes_no_timestamp() {
        let (_tmp, store) = open_store();
        let record = Record::new("https://example.com/a").with_metadata(json!({"title": "A"}));
        let slot = store.put("https://example.com/a", &record).unwrap();

        let loaded = store.get("https://example.com/a").unwrap();
        assert_eq!(loaded.field("metadata").unwrap().as_json().unwrap()["title"], "A");
        assert!(loaded.timestamp.is_none());
        assert!(!slot.join("timestamp.datetime.txt").exists());
    }

    #[test]
    fn test_empty_fields_are_not_written() {
        let (_tmp, store) = open_store();
        let record = Record::new("k")
            .with_field("subtitles", FieldValue::Subtitles(Vec::new()))
            .with_field("jikan", FieldValue::Json(json!({})));
        let slot = store.put("k", &record).unwrap();

        assert!(!slot.join("metadata.json").exists());
        assert!(!slot.join("data").exists());
        assert_eq!(store.get("k").unwrap(), record.without_empty_fields());
    }

    #[test]
    fn test_put_replaces_previous_fields() {
        let (_tmp, store) = open_store();
        let first = store.put("k", &full_record("k")).unwrap();

        let replacement = Record::new("k").with_metadata(json!({"title": "B"}));
        let second = store.put("k", &replacement).unwrap();

        assert_eq!(first, second);
        assert!(!second.join("html_summary.html").exists());
        assert!(!second.join("data").exists());
        assert_eq!(store.get("k").unwrap(), replacement);
    }

    #[test]
    fn test_unknown_field_leaves_existing_data() {
        let (_tmp, store) = open_store();
        store.put("k", &full_record("k")).unwrap();

        let bad = Record::new("k").with_field("unregistered", FieldValue::Text("x".into()));
        assert!(matches!(store.put("k", &bad), Err(Error::UnknownField(name)) if name == "unregistered"));
        assert_eq!(store.get("k").unwrap(), full_record("k"));
    }

    #[test]
    fn test_failed_write_leaves_previous_record() {
        let (_tmp, store) = open_store();
        let slot = store.put("k", &full_record("k")).unwrap();
        // a directory where the subtitle partial goes makes that write fail
        fs::create_dir(slot.join("data").join("subtitles.srt.partial")).unwrap();

        let replacement = full_record("k").with_metadata(json!({"title": "B"}));
        assert!(matches!(store.put("k", &replacement), Err(Error::Io { .. })));

        assert!(!slot.join("metadata.json.partial").exists());
        assert!(!slot.join("html_summary.html.partial").exists());
        assert_eq!(store.get("k").unwrap(), full_record("k"));
    }

    #[test]
    fn test_blank_line_in_subtitle_text_is_rejected() {
        let (_tmp, store) = open_store();
        store.put("k", &full_record("k")).unwrap();

        for text in ["para one\n\npara two", "trailing\n"] {
            let entry = SubtitleEntry { index: 1, start_ms: 0, end_ms: 1200, text: text.into() };
            let record = Record::new("k").with_field("subtitles", FieldValue::Subtitles(vec![entry]));
            assert!(matches!(store.put("k", &record), Err(Error::FieldType { .. })), "{text:?}");
            assert_eq!(store.get("k").unwrap(), full_record("k"));
        }
    }

    #[test]
    fn test_unrecognized_file_is_codec_mismatch() {
        let (_tmp, store) = open_store();
        let slot = store.put("k", &full_record("k")).unwrap();
        fs::write(slot.join("stray.bin"), "?").unwrap();
        assert!(matches!(store.get("k"), Err(Error::CodecMismatch(_))));
    }

    #[test]
    fn test_leftover_partial_file_is_codec_mismatch() {
        let (_tmp, store) = open_store();
        let slot = store.put("k", &full_record("k")).unwrap();
        fs::write(slot.join("metadata.json.partial"), "{\"tit").unwrap();
        assert!(matches!(store.get("k"), Err(Error::CodecMismatch(_))));
    }

    #[test]
    fn test_legacy_url_file_is_ignored() {
        let (_tmp, store) = open_store();
        let slot = store.put("k", &full_record("k")).unwrap();
        fs::write(slot.join("url.txt"), "k").unwrap();
        assert_eq!(store.get("k").unwrap(), full_record("k"));
    }

    #[test]
    fn test_colliding_keys_are_independent() {
        let (_tmp, store) = open_store();
        let bucket = store.dirs().bucket_path("k");
        fs::create_dir_all(bucket.join("000")).unwrap();
        fs::write(bucket.join("000").join(KEY_FILE), "other").unwrap();
        fs::write(bucket.join("000").join("metadata.json"), "{\"title\":\"other\"}").unwrap();

        let slot = store.put("k", &full_record("k")).unwrap();
        assert!(slot.ends_with("001"));
        assert_eq!(store.get("k").unwrap(), full_record("k"));

        let other = store.get("other").unwrap_err();
        assert!(other.is_not_found());
        let sibling = fs::read_to_string(bucket.join("000").join("metadata.json")).unwrap();
        assert!(sibling.contains("other"));
    }

    #[test]
    fn test_delete() {
        let (_tmp, store) = open_store();
        store.put("k", &full_record("k")).unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!store.has("k").unwrap());
        assert!(store.get("k").unwrap_err().is_not_found());
        assert!(!store.delete("k").unwrap());
    }

    #[test]
    fn test_entries() {
        let (_tmp, store) = open_store();
        store.put("a", &Record::new("a")).unwrap();
        store.put("b", &Record::new("b")).unwrap();
        let mut keys: Vec<String> = store.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);

        let mut listed = store.keys().unwrap();
        listed.sort();
        assert_eq!(listed, keys);
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<String>().prop_map(Value::String),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::Bool),
        ]
    }

    fn metadata() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z_]{1,12}", json_leaf(), 0..6)
            .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>()))
    }

    fn cue_text() -> impl Strategy<Value = String> {
        prop_oneof![3 => "[a-zA-Z0-9 ',.!?\n]{0,40}", 1 => any::<String>()]
    }

    fn subtitles() -> impl Strategy<Value = Vec<SubtitleEntry>> {
        prop::collection::vec((any::<u32>(), any::<u64>(), any::<u64>(), cue_text()), 0..5).prop_map(|cues| {
            cues.into_iter()
                .map(|(index, start_ms, end_ms, text)| SubtitleEntry { index, start_ms, end_ms, text })
                .collect()
        })
    }

    fn record() -> impl Strategy<Value = Record> {
        (
            "\\PC{1,60}",
            metadata(),
            prop::option::of(any::<String>()),
            prop::option::of(0i64..4_000_000_000),
            subtitles(),
        )
            .prop_map(|(key, metadata, html_summary, timestamp, subtitles)| {
                let mut record = Record::new(key)
                    .with_metadata(metadata)
                    .with_field("subtitles", FieldValue::Subtitles(subtitles));
                record.html_summary = html_summary;
                record.timestamp = timestamp.and_then(|secs| DateTime::from_timestamp(secs, 0));
                record
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_put_then_get_returns_non_empty_fields(record in record()) {
            let (_tmp, store) = open_store();
            let key = record.key.clone();
            let representable = record
                .field("subtitles")
                .and_then(|v| v.as_subtitles().map(|cues| cues.iter().all(|c| is_representable(&c.text))))
                .unwrap_or(true);

            match store.put(&key, &record) {
                Ok(_) => {
                    prop_assert!(representable);
                    prop_assert_eq!(store.get(&key).unwrap(), record.without_empty_fields());
                }
                Err(Error::FieldType { field, .. }) => {
                    prop_assert!(!representable);
                    prop_assert_eq!(field, "subtitles");
                    prop_assert!(!store.has(&key).unwrap());
                }
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }

        #[test]
        fn test_colliding_slots_stay_independent(
            key in "\\PC{1,40}",
            other in "\\PC{1,40}",
            title in any::<String>(),
            other_title in any::<String>(),
        ) {
            prop_assume!(key != other);
            let (_tmp, store) = open_store();

            // plant a foreign key in the first slot of `key`'s bucket
            let foreign = store.dirs().bucket_path(&key).join("000");
            fs::create_dir_all(&foreign).unwrap();
            fs::write(foreign.join(KEY_FILE), &other).unwrap();
            let sibling = Record::new(other.clone()).with_metadata(json!({"title": other_title}));
            fs::write(foreign.join("metadata.json"), serde_json::to_string(&sibling.metadata).unwrap()).unwrap();

            let record = Record::new(key.clone()).with_metadata(json!({"title": title}));
            let slot = store.put(&key, &record).unwrap();
            prop_assert!(slot.ends_with("001"));
            prop_assert_eq!(store.get(&key).unwrap(), record);

            let stored = fs::read_to_string(foreign.join("metadata.json")).unwrap();
            prop_assert_eq!(serde_json::from_str::<Value>(&stored).unwrap(), sibling.metadata);

            prop_assert!(store.delete(&key).unwrap());
            prop_assert!(foreign.join(KEY_FILE).is_file());
        }
    }
}
