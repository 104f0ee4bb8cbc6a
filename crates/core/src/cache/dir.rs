//! Hash-bucketed directory store.
//!
//! Maps an arbitrary string key to a stable directory without any master
//! index. The key is hashed into a bucket (see [`bucket_path`]) and stored
//! inside one of the bucket's numbered slots (`000`, `001`, ...) together
//! with a `key` file holding the literal key, which is what resolves hash
//! collisions.
//!
//! The filesystem is the only source of truth, so slots may be deleted or
//! moved by hand at any time. There is no locking: two processes putting the
//! same new key into one cache directory can race on slot allocation, so
//! concurrent writers need external coordination (one process per cache
//! directory, or a caller-held lock).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::hash::bucket_path;
use crate::Error;

/// Name of the file holding the raw key inside each slot.
pub const KEY_FILE: &str = "key";

/// Fan-out depth of the bucket layout: three single-character levels plus the remainder.
const BUCKET_DEPTH: usize = 4;

/// Directory store handle rooted at a base directory.
#[derive(Debug, Clone)]
pub struct HashDirStore {
    base: PathBuf,
}

/// A slot found while walking the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub key: String,
    pub path: PathBuf,
}

impl HashDirStore {
    /// Open a store at `base`, creating the directory if needed.
    pub fn open(base: impl AsRef<Path>) -> Result<Self, Error> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base).map_err(|e| Error::io(&base, e))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Bucket directory for `key`. May not exist.
    pub fn bucket_path(&self, key: &str) -> PathBuf {
        bucket_path(&self.base, key)
    }

    /// Slot directory holding `key`.
    ///
    /// A missing bucket is a plain miss, and slots whose key file cannot be
    /// read are treated as non-matching.
    pub fn get(&self, key: &str) -> Result<PathBuf, Error> {
        let bucket = self.bucket_path(key);
        self.find_slot(&bucket, key)?
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// Slot directory for `key`, allocating one if the key is not stored yet.
    ///
    /// New slots take the lowest free index, so gaps left by deleted slots are
    /// reused before the bucket grows.
    pub fn put(&self, key: &str) -> Result<PathBuf, Error> {
        let bucket = self.bucket_path(key);
        if let Some(slot) = self.find_slot(&bucket, key)? {
            return Ok(slot);
        }

        fs::create_dir_all(&bucket).map_err(|e| Error::io(&bucket, e))?;

        let mut index = 0usize;
        loop {
            let candidate = bucket.join(slot_name(index));
            match fs::create_dir(&candidate) {
                Ok(()) => {
                    let key_file = candidate.join(KEY_FILE);
                    fs::write(&key_file, key).map_err(|e| Error::io(&key_file, e))?;
                    tracing::debug!("allocated slot {} for {}", candidate.display(), key);
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => index += 1,
                Err(e) => return Err(Error::io(&candidate, e)),
            }
        }
    }

    pub fn exists(&self, key: &str) -> Result<bool, Error> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove the slot holding `key`. Returns false if nothing was stored.
    pub fn delete(&self, key: &str) -> Result<bool, Error> {
        let slot = match self.get(key) {
            Ok(slot) => slot,
            Err(Error::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        fs::remove_dir_all(&slot).map_err(|e| Error::io(&slot, e))?;
        tracing::debug!("deleted slot {} for {}", slot.display(), key);
        Ok(true)
    }

    /// Every slot in the store that has a readable key file, in path order.
    pub fn slots(&self) -> Result<Vec<SlotEntry>, Error> {
        let mut buckets = vec![self.base.clone()];
        for _ in 0..BUCKET_DEPTH {
            let mut next = Vec::new();
            for dir in &buckets {
                next.extend(subdirs(dir)?);
            }
            buckets = next;
        }

        let mut entries = Vec::new();
        for bucket in buckets {
            for slot in subdirs(&bucket)? {
                if let Some(key) = read_key(&slot) {
                    entries.push(SlotEntry { key, path: slot });
                }
            }
        }
        Ok(entries)
    }

    fn find_slot(&self, bucket: &Path, key: &str) -> Result<Option<PathBuf>, Error> {
        for slot in subdirs(bucket)? {
            if read_key(&slot).as_deref() == Some(key) {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }
}

/// Zero-padded slot directory name.
fn slot_name(index: usize) -> String {
    format!("{index:03}")
}

/// Existing subdirectories of `dir`, sorted. A missing directory has none.
fn subdirs(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Contents of a slot's key file, or None if it is missing or unreadable.
fn read_key(slot: &Path) -> Option<String> {
    let key_file = slot.join(KEY_FILE);
    match fs::read_to_string(&key_file) {
        Ok(contents) => Some(contents),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!("skipping unreadable key file {}: {}", key_file.display(), e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, HashDirStore) {
        let tmp = TempDir::new().unwrap();
        let store = HashDirStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_put_creates_first_slot() {
        let (_tmp, store) = open_store();
        let slot = store.put("something").unwrap();
        assert!(slot.ends_with("4/3/7/b930db84b8079c2dd804a71936b5f/000"));
        assert_eq!(fs::read_to_string(slot.join(KEY_FILE)).unwrap(), "something");
    }

    #[test]
    fn test_get_missing_bucket_is_not_found() {
        let (_tmp, store) = open_store();
        assert!(matches!(store.get("nothing here"), Err(Error::NotFound(_))));
        assert!(!store.exists("nothing here").unwrap());
    }

    #[test]
    fn test_put_is_idempotent() {
        let (_tmp, store) = open_store();
        let first = store.put("key1").unwrap();
        let second = store.put("key1").unwrap();
        assert_eq!(first, second);
        assert_eq!(subdirs(&store.bucket_path("key1")).unwrap().len(), 1);
    }

    #[test]
    fn test_collision_chaining() {
        let (_tmp, store) = open_store();
        let bucket = store.bucket_path("key1");
        fs::create_dir_all(bucket.join("000")).unwrap();
        fs::write(bucket.join("000").join(KEY_FILE), "some other key").unwrap();

        let slot = store.put("key1").unwrap();
        assert!(slot.ends_with("001"));
        assert_eq!(store.get("key1").unwrap(), slot);
        assert_eq!(fs::read_to_string(bucket.join("000").join(KEY_FILE)).unwrap(), "some other key");
    }

    #[test]
    fn test_slot_numbering_fills_gaps() {
        let (_tmp, store) = open_store();
        let bucket = store.bucket_path("new key");
        for (slot, key) in [("000", "a"), ("002", "b")] {
            fs::create_dir_all(bucket.join(slot)).unwrap();
            fs::write(bucket.join(slot).join(KEY_FILE), key).unwrap();
        }

        let slot = store.put("new key").unwrap();
        assert!(slot.ends_with("001"));
    }

    #[test]
    fn test_get_follows_moved_slot() {
        let (_tmp, store) = open_store();
        let slot = store.put("key1").unwrap();
        let moved = slot.with_file_name("001");
        fs::rename(&slot, &moved).unwrap();
        assert_eq!(store.get("key1").unwrap(), moved);
    }

    #[test]
    fn test_corrupted_key_file_is_a_miss() {
        let (_tmp, store) = open_store();
        let slot = store.put("key1").unwrap();
        fs::write(slot.join(KEY_FILE), "key1dsakfjaksjfksaf").unwrap();
        assert!(!store.exists("key1").unwrap());

        let again = store.put("key1").unwrap();
        assert!(again.ends_with("001"));
    }

    #[test]
    fn test_slot_without_key_file_is_skipped() {
        let (_tmp, store) = open_store();
        let bucket = store.bucket_path("key1");
        fs::create_dir_all(bucket.join("000")).unwrap();
        assert!(!store.exists("key1").unwrap());
        assert!(store.put("key1").unwrap().ends_with("001"));
    }

    #[test]
    fn test_delete() {
        let (_tmp, store) = open_store();
        let slot = store.put("key1").unwrap();
        assert!(store.delete("key1").unwrap());
        assert!(!slot.exists());
        assert!(!store.exists("key1").unwrap());
        assert!(!store.delete("key1").unwrap());
    }

    #[test]
    fn test_key_match_is_exact() {
        let (_tmp, store) = open_store();
        store.put("key1").unwrap();
        assert!(!store.exists("key1 ").unwrap());
        assert!(!store.exists("KEY1").unwrap());
    }

    #[test]
    fn test_slots_lists_every_key() {
        let (_tmp, store) = open_store();
        store.put("https://example.com/a").unwrap();
        store.put("https://example.com/b").unwrap();
        store.put("https://example.com/c").unwrap();
        store.delete("https://example.com/b").unwrap();

        let mut keys: Vec<String> = store.slots().unwrap().into_iter().map(|s| s.key).collect();
        keys.sort();
        assert_eq!(keys, vec!["https://example.com/a", "https://example.com/c"]);
    }
}
