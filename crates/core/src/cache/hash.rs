//! Key hashing and bucket path derivation.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

/// Number of single-character fan-out levels before the remainder segment.
const FANOUT_LEVELS: usize = 3;

/// Hex-encoded MD5 digest of the UTF-8 key.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bucket directory for a key under `base`.
///
/// `437b930db84b8079c2dd804a71936b5f` maps to `<base>/4/3/7/b930db84b8079c2dd804a71936b5f`.
pub fn bucket_path(base: &Path, key: &str) -> PathBuf {
    let digest = hash_key(key);
    let mut path = base.to_path_buf();
    for c in digest[..FANOUT_LEVELS].chars() {
        path.push(c.to_string());
    }
    path.push(&digest[FANOUT_LEVELS..]);
    path
}
