//! Checksummed wrapper over a flat key/value backend.
//!
//! Every value is stored alongside a checksum of its serialized bytes under
//! an adjacent key. Reads re-verify the checksum before deserializing; a
//! mismatch discards the entry instead of handing back possibly-corrupted
//! data. The threat model is accidental corruption (interrupted writes,
//! truncated files), not an adversary, so a cheap rolling polynomial hash is
//! enough.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::backend::KeyValueBackend;
use crate::errors::{Result, StorageError};

const CHECKSUM_SUFFIX: &str = ":checksum";
const WATERMARK_SUFFIX: &str = ":watermark";

/// Rolling polynomial hash over the serialized payload. Deterministic and
/// sensitive to single-character changes; not cryptographic.
pub fn checksum(payload: &str) -> String {
    let mut hash: u32 = 5381;
    for byte in payload.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
    }
    format!("{:08x}", hash)
}

/// Outcome of a proactive [`IntegrityStore::validate`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityStatus {
    Valid,
    Absent,
}

/// Local cache with per-key checksums and per-key watermarks.
///
/// Owns the local JSON blob exclusively; nothing else writes through the
/// backend for keys managed here.
pub struct IntegrityStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl IntegrityStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    fn checksum_key(key: &str) -> String {
        format!("{}{}", key, CHECKSUM_SUFFIX)
    }

    fn watermark_key(key: &str) -> String {
        format!("{}{}", key, WATERMARK_SUFFIX)
    }

    /// Serialize and persist a value together with its checksum. The two
    /// writes are sequential but treated as a unit; the checksum lands last
    /// so a crash in between reads back as a violation, not stale data.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        let sum = checksum(&raw);
        self.backend.set(key, &raw)?;
        self.backend.set(&Self::checksum_key(key), &sum)?;
        Ok(())
    }

    /// Persist a value and its watermark as one logical write, keeping the
    /// data-never-without-watermark invariant.
    pub fn write_with_watermark<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        watermark: DateTime<Utc>,
    ) -> Result<()> {
        self.write(key, value)?;
        self.write_watermark(key, watermark)
    }

    /// Read and verify a value. A checksum mismatch discards the entry,
    /// clears its checksum, logs, and reads back as absent — callers get
    /// either verified data or nothing.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = match self.backend.get(key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let stored_sum = self.backend.get(&Self::checksum_key(key))?;
        if stored_sum.as_deref() != Some(checksum(&raw).as_str()) {
            log::warn!("integrity violation for '{}', discarding cached entry", key);
            self.discard(key)?;
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Verify a key without deserializing or returning data. Reports
    /// `integrity_violation` on mismatch; used for health checks on load.
    pub fn validate(&self, key: &str) -> Result<IntegrityStatus> {
        let raw = match self.backend.get(key)? {
            Some(raw) => raw,
            None => return Ok(IntegrityStatus::Absent),
        };
        let stored_sum = self.backend.get(&Self::checksum_key(key))?;
        if stored_sum.as_deref() != Some(checksum(&raw).as_str()) {
            self.discard(key)?;
            return Err(StorageError::integrity_violation(key));
        }
        Ok(IntegrityStatus::Valid)
    }

    /// Remove a value and its checksum. The watermark is left in place; it
    /// records mutation time, not content.
    pub fn discard(&self, key: &str) -> Result<()> {
        self.backend.remove(key)?;
        self.backend.remove(&Self::checksum_key(key))
    }

    /// Record the local watermark for a collection key.
    pub fn write_watermark(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.backend.set(&Self::watermark_key(key), &at.to_rfc3339())
    }

    /// Read the local watermark for a collection key, if any. A watermark
    /// that fails to parse is treated as absent.
    pub fn read_watermark(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let raw = match self.backend.get(&Self::watermark_key(key))? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        Ok(DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)))
    }
}
