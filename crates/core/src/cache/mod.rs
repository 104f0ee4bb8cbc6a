//! Filesystem-backed, content-addressed record cache.
//!
//! This module provides a persistent cache with no master index:
//!
//! - Hash-bucketed slot directories with collision chaining ([`dir`])
//! - Named field codecs, one file per record attribute ([`codec`])
//! - Record get/put/has/delete over both ([`store`])
//!
//! Directories can be inspected, edited or deleted by hand; the filesystem
//! is always the source of truth.

pub mod codec;
pub mod dir;
pub mod hash;
pub mod record;
pub mod store;
pub mod subtitles;

pub use crate::Error;

pub use codec::{CodecRegistry, FieldCodec, FieldFormat, FieldValue};
pub use dir::{HashDirStore, SlotEntry};
pub use record::Record;
pub use store::RecordStore;
pub use subtitles::SubtitleEntry;
