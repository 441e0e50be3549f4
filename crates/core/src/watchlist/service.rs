//! Watchlist service.
//!
//! An explicit instance owning its collection state through injected
//! collaborators (cache handle, remote collection, plan limits) rather than
//! process-wide statics; the composition root decides lifecycle.

use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;

use watchdeck_market_data::Quote;
use watchdeck_storage::IntegrityStore;

use crate::errors::Result;
use crate::limits::{PlanFeature, PlanLimits};
use crate::sync::{normalize_ticker, NaturalKeyed, RemoteCollection};
use crate::watchlist::WatchedSymbol;

/// Cache key and remote collection name for the watchlist.
pub const WATCHLIST_COLLECTION: &str = "watchlist";

/// Result of an add attempt. Quota exhaustion and duplicates are expected
/// outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added {
        symbol: WatchedSymbol,
        /// False when the remote upsert failed and the entry is local-only
        /// until the next reconciliation pushes it.
        remote_synced: bool,
    },
    Duplicate {
        ticker: String,
    },
    QuotaExceeded {
        limit: usize,
    },
}

impl AddOutcome {
    /// Blocking or advisory text the UI should show, if any.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::QuotaExceeded { limit } => Some(format!(
                "Watchlist limit of {} reached. Upgrade your plan or remove a symbol first.",
                limit
            )),
            Self::Added {
                remote_synced: false,
                ..
            } => Some("Saved locally. Sync will retry shortly.".to_string()),
            _ => None,
        }
    }
}

pub struct WatchlistService {
    cache: Arc<IntegrityStore>,
    remote: Arc<dyn RemoteCollection<WatchedSymbol>>,
    limits: PlanLimits,
    user_id: String,
}

impl WatchlistService {
    pub fn new(
        cache: Arc<IntegrityStore>,
        remote: Arc<dyn RemoteCollection<WatchedSymbol>>,
        limits: PlanLimits,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            remote,
            limits,
            user_id: user_id.into(),
        }
    }

    /// Current watchlist from the local cache. A corrupted entry self-heals
    /// to empty.
    pub fn list(&self) -> Result<Vec<WatchedSymbol>> {
        Ok(self.cache.read(WATCHLIST_COLLECTION)?.unwrap_or_default())
    }

    /// Add a symbol. Duplicate natural keys and quota exhaustion return
    /// their respective outcomes without touching either store.
    pub async fn add(&self, symbol: WatchedSymbol) -> Result<AddOutcome> {
        let mut current = self.list()?;

        let key = symbol.natural_key();
        if current.iter().any(|existing| existing.natural_key() == key) {
            return Ok(AddOutcome::Duplicate { ticker: key });
        }
        if !self.limits.can_add(PlanFeature::Watchlist, current.len()) {
            let limit = self
                .limits
                .limit_for(PlanFeature::Watchlist)
                .unwrap_or(current.len());
            return Ok(AddOutcome::QuotaExceeded { limit });
        }

        current.push(symbol.clone());
        self.cache
            .write_with_watermark(WATCHLIST_COLLECTION, &current, Utc::now())?;

        let remote_synced = match self.remote.upsert(&self.user_id, &symbol).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "remote upsert for '{}' failed, keeping local copy: {}",
                    symbol.ticker, e
                );
                false
            }
        };

        Ok(AddOutcome::Added {
            symbol,
            remote_synced,
        })
    }

    /// Remove a symbol by ticker. Returns whether anything was removed.
    pub async fn remove(&self, ticker: &str) -> Result<bool> {
        let key = normalize_ticker(ticker);
        let current = self.list()?;
        let before = current.len();
        let kept: Vec<WatchedSymbol> = current
            .into_iter()
            .filter(|s| s.natural_key() != key)
            .collect();
        if kept.len() == before {
            return Ok(false);
        }

        self.cache
            .write_with_watermark(WATCHLIST_COLLECTION, &kept, Utc::now())?;
        if let Err(e) = self.remote.delete(&self.user_id, &key).await {
            warn!("remote delete for '{}' failed: {}", key, e);
        }
        Ok(true)
    }

    /// Trim the stored collection to the plan limit, persisting only when
    /// something was dropped. Returns the drop count.
    pub fn enforce_limits(&self) -> Result<usize> {
        let current = self.list()?;
        let enforced = self.limits.enforce(PlanFeature::Watchlist, current);
        if enforced.dropped_count > 0 {
            debug!(
                "watchlist trimmed to plan limit, dropped {} entries",
                enforced.dropped_count
            );
            self.cache
                .write_with_watermark(WATCHLIST_COLLECTION, &enforced.kept, Utc::now())?;
        }
        Ok(enforced.dropped_count)
    }

    /// Update last-known prices from a batch of fresh quotes. Returns how
    /// many entries changed.
    pub fn refresh_prices(&self, quotes: &[Quote]) -> Result<usize> {
        let mut current = self.list()?;
        let mut updated = 0;
        for quote in quotes {
            let key = normalize_ticker(&quote.symbol);
            if let Some(entry) = current.iter_mut().find(|s| s.natural_key() == key) {
                entry.last_known_price = quote.price;
                entry.last_known_change_percent = quote.change_percent;
                updated += 1;
            }
        }
        if updated > 0 {
            self.cache
                .write_with_watermark(WATCHLIST_COLLECTION, &current, Utc::now())?;
        }
        Ok(updated)
    }

    /// Tickers to feed the alert engine, in watchlist order.
    pub fn symbol_set(&self) -> Result<Vec<String>> {
        Ok(self.list()?.into_iter().map(|s| s.ticker).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use watchdeck_storage::MemoryBackend;

    #[derive(Default)]
    struct FakeRemote {
        items: Mutex<Vec<WatchedSymbol>>,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl RemoteCollection<WatchedSymbol> for FakeRemote {
        async fn list(&self, _user_id: &str) -> Result<Vec<WatchedSymbol>> {
            Ok(self.items.lock().unwrap().clone())
        }

        async fn upsert(&self, _user_id: &str, item: &WatchedSymbol) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::remote_unavailable("down"));
            }
            self.items.lock().unwrap().push(item.clone());
            Ok(())
        }

        async fn delete(&self, _user_id: &str, natural_key: &str) -> Result<()> {
            self.items
                .lock()
                .unwrap()
                .retain(|i| i.natural_key() != natural_key);
            Ok(())
        }

        async fn replace_all(&self, _user_id: &str, items: &[WatchedSymbol]) -> Result<()> {
            *self.items.lock().unwrap() = items.to_vec();
            Ok(())
        }

        async fn last_modified_at(&self, _user_id: &str) -> Result<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    fn service(limits: PlanLimits) -> (WatchlistService, Arc<FakeRemote>, Arc<IntegrityStore>) {
        let cache = Arc::new(IntegrityStore::new(Arc::new(MemoryBackend::new())));
        let remote = Arc::new(FakeRemote::default());
        let svc = WatchlistService::new(
            cache.clone(),
            remote.clone() as Arc<dyn RemoteCollection<WatchedSymbol>>,
            limits,
            "u1",
        );
        (svc, remote, cache)
    }

    fn tiny_plan(max_watchlist: i64) -> PlanLimits {
        PlanLimits {
            plan_name: "tiny".to_string(),
            max_watchlist,
            max_alerts: 20,
            max_options_flow: 0,
        }
    }

    fn symbol(ticker: &str) -> WatchedSymbol {
        WatchedSymbol::new(ticker, ticker, "US", "USD", "NASDAQ").unwrap()
    }

    #[tokio::test]
    async fn add_and_list_round_trip() {
        let (svc, remote, _) = service(PlanLimits::premium());
        let outcome = svc.add(symbol("aapl")).await.unwrap();
        assert!(matches!(
            outcome,
            AddOutcome::Added {
                remote_synced: true,
                ..
            }
        ));
        assert_eq!(svc.symbol_set().unwrap(), vec!["AAPL"]);
        assert_eq!(remote.items.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_natural_key_is_rejected_without_writes() {
        let (svc, remote, _) = service(PlanLimits::premium());
        svc.add(symbol("AAPL")).await.unwrap();
        let outcome = svc.add(symbol(" aapl")).await.unwrap();
        assert_eq!(
            outcome,
            AddOutcome::Duplicate {
                ticker: "AAPL".to_string()
            }
        );
        assert_eq!(svc.list().unwrap().len(), 1);
        assert_eq!(remote.items.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quota_blocks_at_limit_with_actionable_message() {
        let limits = PlanLimits {
            plan_name: "tiny".to_string(),
            max_watchlist: 1,
            max_alerts: 20,
            max_options_flow: 0,
        };
        let (svc, _, _) = service(limits);
        svc.add(symbol("AAPL")).await.unwrap();

        let outcome = svc.add(symbol("MSFT")).await.unwrap();
        assert_eq!(outcome, AddOutcome::QuotaExceeded { limit: 1 });
        assert!(outcome.user_message().unwrap().contains("limit of 1"));
        assert_eq!(svc.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remote_failure_degrades_to_local_only() {
        let (svc, remote, _) = service(PlanLimits::premium());
        remote.fail_writes.store(true, Ordering::SeqCst);

        let outcome = svc.add(symbol("NVDA")).await.unwrap();
        assert!(matches!(
            outcome,
            AddOutcome::Added {
                remote_synced: false,
                ..
            }
        ));
        assert!(outcome.user_message().unwrap().contains("Saved locally"));
        assert_eq!(svc.list().unwrap().len(), 1);
        assert!(remote.items.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_deletes_by_normalized_ticker() {
        let (svc, remote, _) = service(PlanLimits::premium());
        svc.add(symbol("RY.TO")).await.unwrap();

        assert!(svc.remove(" ry.to ").await.unwrap());
        assert!(svc.list().unwrap().is_empty());
        assert!(remote.items.lock().unwrap().is_empty());
        assert!(!svc.remove("ry.to").await.unwrap());
    }

    #[tokio::test]
    async fn enforce_limits_trims_oldest_first() {
        // seed three entries under an unlimited plan, then re-open the same
        // cache under a downgraded plan (the downgrade-on-renewal path)
        let (svc, remote, cache) = service(PlanLimits::premium());
        for t in ["A", "B", "C"] {
            svc.add(symbol(t)).await.unwrap();
        }

        let downgraded = WatchlistService::new(
            cache,
            remote as Arc<dyn RemoteCollection<WatchedSymbol>>,
            tiny_plan(2),
            "u1",
        );
        assert_eq!(downgraded.enforce_limits().unwrap(), 1);
        assert_eq!(downgraded.symbol_set().unwrap(), vec!["B", "C"]);
        // second pass is a no-op
        assert_eq!(downgraded.enforce_limits().unwrap(), 0);
    }

    #[tokio::test]
    async fn refresh_prices_updates_matching_entries() {
        let (svc, _, _) = service(PlanLimits::premium());
        svc.add(symbol("AAPL")).await.unwrap();

        let quote = Quote {
            symbol: "aapl".to_string(),
            price: 191.2,
            change: 2.1,
            change_percent: 1.1,
            volume: 0.0,
            avg_volume: 0.0,
            high52w: 0.0,
            low52w: 0.0,
        };
        assert_eq!(svc.refresh_prices(&[quote]).unwrap(), 1);
        let listed = svc.list().unwrap();
        assert_eq!(listed[0].last_known_price, 191.2);
        assert_eq!(listed[0].last_known_change_percent, 1.1);
    }
}
