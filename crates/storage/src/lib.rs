//! Checksummed local cache for watchdeck.
//!
//! The local side of every mirrored collection lives here: a flat key/value
//! backend plus an integrity layer that verifies each entry on read and
//! tracks per-collection watermarks for the sync reconciler.

pub mod backend;
pub mod errors;
pub mod integrity;

pub use backend::{JsonFileBackend, KeyValueBackend, MemoryBackend};
pub use errors::{Result, StorageError};
pub use integrity::{checksum, IntegrityStatus, IntegrityStore};
