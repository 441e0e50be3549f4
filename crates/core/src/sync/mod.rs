//! Dual-store synchronization.
//!
//! Every mirrored collection lives in the checksummed local cache and in the
//! authoritative remote store. The reconciler converges the two with a
//! whole-collection last-write-wins policy keyed by watermarks; items are
//! identified across stores by their natural key (normalized ticker), never
//! by storage-generated ids.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::errors::Result;

mod reconciler;

pub use reconciler::{SyncOutcome, SyncReconciler};

/// Identity of an item independent of its storage id. Two items with equal
/// natural keys are the same entity.
pub trait NaturalKeyed {
    fn natural_key(&self) -> String;
}

/// Normalize a raw ticker into its natural-key form: uppercased, whitespace
/// stripped, market suffix preserved ("ry.to " -> "RY.TO").
pub fn normalize_ticker(raw: &str) -> String {
    raw.split_whitespace().collect::<String>().to_uppercase()
}

/// Drop duplicate natural keys, keeping the first occurrence in existing
/// order. Idempotent.
pub fn dedupe_by_natural_key<T: NaturalKeyed>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.natural_key()))
        .collect()
}

/// One user-scoped collection in the authoritative remote store.
///
/// `replace_all` must be a single atomic swap on the remote side; a failed
/// replace leaves the previous rows in place rather than deleting without
/// re-inserting.
#[async_trait]
pub trait RemoteCollection<T>: Send + Sync {
    async fn list(&self, user_id: &str) -> Result<Vec<T>>;
    async fn upsert(&self, user_id: &str, item: &T) -> Result<()>;
    async fn delete(&self, user_id: &str, natural_key: &str) -> Result<()>;
    async fn replace_all(&self, user_id: &str, items: &[T]) -> Result<()>;

    /// Watermark of the most recent remote mutation, if the collection has
    /// ever been written.
    async fn last_modified_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>>;
}
