//! Whole-collection last-write-wins reconciler.
//!
//! Converges one named collection between the local integrity cache and the
//! remote store. This is deliberately not a field-level merge: the fresher
//! side (by watermark) wins wholesale. Items are small and user edits are
//! infrequent, so a rare concurrent edit between sync points can lose the
//! losing side's delta; that trade-off is documented, not hidden.
//!
//! Callers must keep at most one reconciliation per collection in flight
//! (the refresh scheduler's in-flight guard covers this).

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use watchdeck_storage::IntegrityStore;

use crate::errors::{Error, Result};
use crate::sync::{dedupe_by_natural_key, NaturalKeyed, RemoteCollection};

/// What a reconciliation run did, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Neither side had data.
    BothEmpty,
    /// Remote was empty; every local item was pushed up.
    SeededRemote { pushed: usize },
    /// Local was empty; remote was pulled down.
    PulledRemote { count: usize },
    /// Remote was at least as fresh and overwrote local.
    RemoteWon { count: usize },
    /// Local was strictly fresher and replaced remote.
    LocalWon { count: usize },
}

pub struct SyncReconciler<T> {
    cache: Arc<IntegrityStore>,
    remote: Arc<dyn RemoteCollection<T>>,
    collection_key: String,
}

impl<T> SyncReconciler<T>
where
    T: NaturalKeyed + Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(
        cache: Arc<IntegrityStore>,
        remote: Arc<dyn RemoteCollection<T>>,
        collection_key: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            remote,
            collection_key: collection_key.into(),
        }
    }

    /// Run one reconciliation for `user_id`.
    ///
    /// Stages run strictly in order: read both sides, de-duplicate, decide by
    /// watermark, write. A remote read failure surfaces as
    /// [`Error::RemoteUnavailable`] (trust local for this session); a remote
    /// write failure surfaces as [`Error::Reconciliation`]. In both cases the
    /// local collection is left at its last known good state.
    pub async fn reconcile(&self, user_id: &str) -> Result<SyncOutcome> {
        let key = self.collection_key.as_str();

        // A corrupted cache entry self-heals to absent here, which routes us
        // through the pull-from-remote branch.
        let local: Vec<T> = self.cache.read(key)?.unwrap_or_default();
        let local = dedupe_by_natural_key(local);
        let remote_items = self.remote.list(user_id).await?;
        let remote_items = dedupe_by_natural_key(remote_items);

        match (local.is_empty(), remote_items.is_empty()) {
            (true, true) => {
                debug!("reconcile '{}': both sides empty", key);
                Ok(SyncOutcome::BothEmpty)
            }
            (false, true) => self.seed_remote(user_id, local).await,
            (true, false) => {
                let count = remote_items.len();
                let watermark = self
                    .remote
                    .last_modified_at(user_id)
                    .await?
                    .unwrap_or_else(Utc::now);
                self.cache
                    .write_with_watermark(key, &remote_items, watermark)?;
                debug!("reconcile '{}': pulled {} remote items", key, count);
                Ok(SyncOutcome::PulledRemote { count })
            }
            (false, false) => self.converge(user_id, local, remote_items).await,
        }
    }

    /// First sync or remote reset: push every local item individually
    /// (idempotent upserts by natural key), then pull the remote result back,
    /// carrying the local watermark forward.
    async fn seed_remote(&self, user_id: &str, local: Vec<T>) -> Result<SyncOutcome> {
        let key = self.collection_key.as_str();
        let pushed = local.len();

        for item in &local {
            self.remote
                .upsert(user_id, item)
                .await
                .map_err(|e| self.write_failure(e))?;
        }

        let merged = self
            .remote
            .list(user_id)
            .await
            .map_err(|e| self.write_failure(e))?;
        let watermark = self.cache.read_watermark(key)?.unwrap_or_else(Utc::now);
        self.cache.write_with_watermark(key, &merged, watermark)?;

        debug!("reconcile '{}': seeded remote with {} items", key, pushed);
        Ok(SyncOutcome::SeededRemote { pushed })
    }

    /// Both sides populated: last write wins by watermark. A missing
    /// watermark compares as the epoch, and ties resolve to remote — a
    /// deliberate, consistent tie-break rather than a correctness guarantee.
    async fn converge(&self, user_id: &str, local: Vec<T>, remote_items: Vec<T>) -> Result<SyncOutcome> {
        let key = self.collection_key.as_str();
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let local_watermark = self.cache.read_watermark(key)?.unwrap_or(epoch);
        let remote_watermark = self
            .remote
            .last_modified_at(user_id)
            .await?
            .unwrap_or(epoch);

        if remote_watermark >= local_watermark {
            // Adopt the remote watermark rather than stamping now: an
            // unchanged remote ties on the next run (ties favor remote), so
            // repeated reconciliation converges without issuing writes.
            let count = remote_items.len();
            self.cache
                .write_with_watermark(key, &remote_items, remote_watermark)?;
            debug!(
                "reconcile '{}': remote won ({} items, remote {} >= local {})",
                key, count, remote_watermark, local_watermark
            );
            return Ok(SyncOutcome::RemoteWon { count });
        }

        // Local strictly newer: full remote replacement in one request, then
        // pull the result back so local reflects what the server accepted.
        self.remote
            .replace_all(user_id, &local)
            .await
            .map_err(|e| self.write_failure(e))?;
        let merged = self
            .remote
            .list(user_id)
            .await
            .map_err(|e| self.write_failure(e))?;
        let count = merged.len();
        let watermark = self
            .remote
            .last_modified_at(user_id)
            .await?
            .unwrap_or_else(Utc::now);
        self.cache.write_with_watermark(key, &merged, watermark)?;

        debug!("reconcile '{}': local won ({} items)", key, count);
        Ok(SyncOutcome::LocalWon { count })
    }

    fn write_failure(&self, source: Error) -> Error {
        warn!(
            "reconcile '{}' aborted, keeping local state: {}",
            self.collection_key, source
        );
        Error::reconciliation(self.collection_key.clone(), source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::normalize_ticker;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use watchdeck_storage::MemoryBackend;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        ticker: String,
    }

    impl Item {
        fn new(ticker: &str) -> Self {
            Self {
                ticker: ticker.to_string(),
            }
        }
    }

    impl NaturalKeyed for Item {
        fn natural_key(&self) -> String {
            normalize_ticker(&self.ticker)
        }
    }

    #[derive(Default)]
    struct FakeRemote {
        items: Mutex<Vec<Item>>,
        last_modified: Mutex<Option<DateTime<Utc>>>,
        fail_writes: AtomicBool,
        write_calls: AtomicUsize,
    }

    impl FakeRemote {
        fn with_items(items: Vec<Item>, last_modified: Option<DateTime<Utc>>) -> Self {
            Self {
                items: Mutex::new(items),
                last_modified: Mutex::new(last_modified),
                ..Self::default()
            }
        }

        fn snapshot(&self) -> Vec<Item> {
            self.items.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteCollection<Item> for FakeRemote {
        async fn list(&self, _user_id: &str) -> Result<Vec<Item>> {
            Ok(self.snapshot())
        }

        async fn upsert(&self, _user_id: &str, item: &Item) -> Result<()> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::remote_unavailable("upsert refused"));
            }
            let mut items = self.items.lock().unwrap();
            if let Some(existing) = items
                .iter_mut()
                .find(|i| i.natural_key() == item.natural_key())
            {
                *existing = item.clone();
            } else {
                items.push(item.clone());
            }
            *self.last_modified.lock().unwrap() = Some(Utc::now());
            Ok(())
        }

        async fn delete(&self, _user_id: &str, natural_key: &str) -> Result<()> {
            self.items
                .lock()
                .unwrap()
                .retain(|i| i.natural_key() != natural_key);
            Ok(())
        }

        async fn replace_all(&self, _user_id: &str, new_items: &[Item]) -> Result<()> {
            self.write_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                // Atomic swap semantics: a refused replace changes nothing.
                return Err(Error::remote_unavailable("replace refused"));
            }
            *self.items.lock().unwrap() = new_items.to_vec();
            *self.last_modified.lock().unwrap() = Some(Utc::now());
            Ok(())
        }

        async fn last_modified_at(&self, _user_id: &str) -> Result<Option<DateTime<Utc>>> {
            Ok(*self.last_modified.lock().unwrap())
        }
    }

    fn cache() -> Arc<IntegrityStore> {
        Arc::new(IntegrityStore::new(Arc::new(MemoryBackend::new())))
    }

    fn reconciler(
        cache: &Arc<IntegrityStore>,
        remote: &Arc<FakeRemote>,
    ) -> SyncReconciler<Item> {
        SyncReconciler::new(
            cache.clone(),
            remote.clone() as Arc<dyn RemoteCollection<Item>>,
            "watchlist",
        )
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(secs)
    }

    #[tokio::test]
    async fn empty_remote_gets_seeded_from_local() {
        let cache = cache();
        let remote = Arc::new(FakeRemote::default());
        cache
            .write_with_watermark("watchlist", &vec![Item::new("AAPL"), Item::new("aapl")], ts(100))
            .unwrap();

        let outcome = reconciler(&cache, &remote).reconcile("u1").await.unwrap();

        // local duplicate collapsed before pushing
        assert_eq!(outcome, SyncOutcome::SeededRemote { pushed: 1 });
        assert_eq!(remote.snapshot(), vec![Item::new("AAPL")]);
        let local: Vec<Item> = cache.read("watchlist").unwrap().unwrap();
        assert_eq!(local, vec![Item::new("AAPL")]);
        // pre-existing local watermark carried forward
        assert_eq!(cache.read_watermark("watchlist").unwrap(), Some(ts(100)));
    }

    #[tokio::test]
    async fn empty_local_pulls_remote() {
        let cache = cache();
        let remote = Arc::new(FakeRemote::with_items(
            vec![Item::new("MSFT")],
            Some(ts(50)),
        ));

        let outcome = reconciler(&cache, &remote).reconcile("u1").await.unwrap();

        assert_eq!(outcome, SyncOutcome::PulledRemote { count: 1 });
        let local: Vec<Item> = cache.read("watchlist").unwrap().unwrap();
        assert_eq!(local, vec![Item::new("MSFT")]);
        assert_eq!(cache.read_watermark("watchlist").unwrap(), Some(ts(50)));

        // with the remote watermark adopted, an immediate re-run ties and
        // issues no remote writes
        let outcome = reconciler(&cache, &remote).reconcile("u1").await.unwrap();
        assert_eq!(outcome, SyncOutcome::RemoteWon { count: 1 });
        assert_eq!(remote.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresher_remote_overwrites_local() {
        // spec scenario: local [AAPL] @100, remote [AAPL, MSFT] @200
        let cache = cache();
        let remote = Arc::new(FakeRemote::with_items(
            vec![Item::new("AAPL"), Item::new("MSFT")],
            Some(ts(200)),
        ));
        cache
            .write_with_watermark("watchlist", &vec![Item::new("AAPL")], ts(100))
            .unwrap();

        let outcome = reconciler(&cache, &remote).reconcile("u1").await.unwrap();

        assert_eq!(outcome, SyncOutcome::RemoteWon { count: 2 });
        let local: Vec<Item> = cache.read("watchlist").unwrap().unwrap();
        assert_eq!(local, vec![Item::new("AAPL"), Item::new("MSFT")]);
        assert_eq!(local, remote.snapshot());
        // local adopts the remote watermark, not the wall clock
        assert_eq!(cache.read_watermark("watchlist").unwrap(), Some(ts(200)));
    }

    #[tokio::test]
    async fn watermark_tie_resolves_to_remote() {
        let cache = cache();
        let remote = Arc::new(FakeRemote::with_items(vec![Item::new("TSLA")], Some(ts(100))));
        cache
            .write_with_watermark("watchlist", &vec![Item::new("NVDA")], ts(100))
            .unwrap();

        let outcome = reconciler(&cache, &remote).reconcile("u1").await.unwrap();

        assert_eq!(outcome, SyncOutcome::RemoteWon { count: 1 });
        let local: Vec<Item> = cache.read("watchlist").unwrap().unwrap();
        assert_eq!(local, vec![Item::new("TSLA")]);
    }

    #[tokio::test]
    async fn strictly_newer_local_replaces_remote() {
        let cache = cache();
        let remote = Arc::new(FakeRemote::with_items(vec![Item::new("OLD")], Some(ts(100))));
        cache
            .write_with_watermark("watchlist", &vec![Item::new("NEW"), Item::new("new")], ts(200))
            .unwrap();

        let r = reconciler(&cache, &remote);
        let outcome = r.reconcile("u1").await.unwrap();

        assert_eq!(outcome, SyncOutcome::LocalWon { count: 1 });
        assert_eq!(remote.snapshot(), vec![Item::new("NEW")]);
        let local: Vec<Item> = cache.read("watchlist").unwrap().unwrap();
        assert_eq!(local, remote.snapshot());

        // the post-replace watermark was adopted, so a re-run ties and issues
        // no further remote writes
        let writes_after_replace = remote.write_calls.load(Ordering::SeqCst);
        let outcome = r.reconcile("u1").await.unwrap();
        assert_eq!(outcome, SyncOutcome::RemoteWon { count: 1 });
        assert_eq!(
            remote.write_calls.load(Ordering::SeqCst),
            writes_after_replace
        );
    }

    #[tokio::test]
    async fn second_run_without_mutation_is_convergent() {
        let cache = cache();
        let remote = Arc::new(FakeRemote::with_items(
            vec![Item::new("AAPL"), Item::new("MSFT")],
            Some(ts(200)),
        ));
        cache
            .write_with_watermark("watchlist", &vec![Item::new("AAPL")], ts(100))
            .unwrap();

        let r = reconciler(&cache, &remote);
        r.reconcile("u1").await.unwrap();
        let after_first: Vec<Item> = cache.read("watchlist").unwrap().unwrap();
        let remote_after_first = remote.snapshot();

        let outcome = r.reconcile("u1").await.unwrap();
        let after_second: Vec<Item> = cache.read("watchlist").unwrap().unwrap();

        // second run is an identical overwrite, no remote writes issued
        assert_eq!(outcome, SyncOutcome::RemoteWon { count: 2 });
        assert_eq!(after_first, after_second);
        assert_eq!(remote_after_first, remote.snapshot());
        assert_eq!(remote.write_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_remote_write_aborts_and_keeps_local() {
        let cache = cache();
        let remote = Arc::new(FakeRemote::with_items(vec![Item::new("OLD")], Some(ts(100))));
        remote.fail_writes.store(true, Ordering::SeqCst);
        cache
            .write_with_watermark("watchlist", &vec![Item::new("NEW")], ts(200))
            .unwrap();

        let err = reconciler(&cache, &remote).reconcile("u1").await.unwrap_err();

        assert!(matches!(err, Error::Reconciliation { .. }));
        // local untouched, remote untouched
        let local: Vec<Item> = cache.read("watchlist").unwrap().unwrap();
        assert_eq!(local, vec![Item::new("NEW")]);
        assert_eq!(cache.read_watermark("watchlist").unwrap(), Some(ts(200)));
        assert_eq!(remote.snapshot(), vec![Item::new("OLD")]);
    }

    #[tokio::test]
    async fn missing_remote_watermark_lets_local_win() {
        let cache = cache();
        let remote = Arc::new(FakeRemote::with_items(vec![Item::new("OLD")], None));
        cache
            .write_with_watermark("watchlist", &vec![Item::new("NEW")], ts(5))
            .unwrap();

        let outcome = reconciler(&cache, &remote).reconcile("u1").await.unwrap();

        assert_eq!(outcome, SyncOutcome::LocalWon { count: 1 });
        assert_eq!(remote.snapshot(), vec![Item::new("NEW")]);
    }
}
