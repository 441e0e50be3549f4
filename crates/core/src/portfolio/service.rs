//! Portfolio service. Same shape as the watchlist service; positions have no
//! plan cap, so there is no quota path here.

use chrono::Utc;
use log::warn;
use std::sync::Arc;

use watchdeck_market_data::Quote;
use watchdeck_storage::IntegrityStore;

use crate::errors::Result;
use crate::portfolio::PortfolioPosition;
use crate::sync::{normalize_ticker, NaturalKeyed, RemoteCollection};

/// Cache key and remote collection name for portfolio positions.
pub const PORTFOLIO_COLLECTION: &str = "portfolio";

pub struct PortfolioService {
    cache: Arc<IntegrityStore>,
    remote: Arc<dyn RemoteCollection<PortfolioPosition>>,
    user_id: String,
}

impl PortfolioService {
    pub fn new(
        cache: Arc<IntegrityStore>,
        remote: Arc<dyn RemoteCollection<PortfolioPosition>>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            remote,
            user_id: user_id.into(),
        }
    }

    pub fn list(&self) -> Result<Vec<PortfolioPosition>> {
        Ok(self.cache.read(PORTFOLIO_COLLECTION)?.unwrap_or_default())
    }

    /// Add or replace the position for a ticker. Upserting by natural key
    /// keeps one position per symbol.
    pub async fn upsert(&self, position: PortfolioPosition) -> Result<()> {
        let mut current = self.list()?;
        let key = position.natural_key();
        if let Some(existing) = current.iter_mut().find(|p| p.natural_key() == key) {
            *existing = position.clone();
        } else {
            current.push(position.clone());
        }
        self.cache
            .write_with_watermark(PORTFOLIO_COLLECTION, &current, Utc::now())?;

        if let Err(e) = self.remote.upsert(&self.user_id, &position).await {
            warn!(
                "remote upsert for position '{}' failed, keeping local copy: {}",
                position.ticker, e
            );
        }
        Ok(())
    }

    pub async fn remove(&self, ticker: &str) -> Result<bool> {
        let key = normalize_ticker(ticker);
        let current = self.list()?;
        let before = current.len();
        let kept: Vec<PortfolioPosition> = current
            .into_iter()
            .filter(|p| p.natural_key() != key)
            .collect();
        if kept.len() == before {
            return Ok(false);
        }
        self.cache
            .write_with_watermark(PORTFOLIO_COLLECTION, &kept, Utc::now())?;
        if let Err(e) = self.remote.delete(&self.user_id, &key).await {
            warn!("remote delete for position '{}' failed: {}", key, e);
        }
        Ok(true)
    }

    /// Update current prices from fresh quotes. Returns how many positions
    /// changed.
    pub fn refresh_prices(&self, quotes: &[Quote]) -> Result<usize> {
        let mut current = self.list()?;
        let mut updated = 0;
        for quote in quotes {
            let key = normalize_ticker(&quote.symbol);
            if let Some(position) = current.iter_mut().find(|p| p.natural_key() == key) {
                position.current_price = quote.price;
                updated += 1;
            }
        }
        if updated > 0 {
            self.cache
                .write_with_watermark(PORTFOLIO_COLLECTION, &current, Utc::now())?;
        }
        Ok(updated)
    }

    /// Portfolio totals derived from current prices.
    pub fn totals(&self) -> Result<(f64, f64)> {
        let positions = self.list()?;
        let market_value: f64 = positions.iter().map(|p| p.market_value()).sum();
        let unrealized: f64 = positions.iter().map(|p| p.unrealized_pnl()).sum();
        Ok((market_value, unrealized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;
    use watchdeck_storage::MemoryBackend;

    #[derive(Default)]
    struct FakeRemote {
        items: Mutex<Vec<PortfolioPosition>>,
    }

    #[async_trait]
    impl RemoteCollection<PortfolioPosition> for FakeRemote {
        async fn list(&self, _user_id: &str) -> Result<Vec<PortfolioPosition>> {
            Ok(self.items.lock().unwrap().clone())
        }

        async fn upsert(&self, _user_id: &str, item: &PortfolioPosition) -> Result<()> {
            let mut items = self.items.lock().unwrap();
            items.retain(|i| i.natural_key() != item.natural_key());
            items.push(item.clone());
            Ok(())
        }

        async fn delete(&self, _user_id: &str, natural_key: &str) -> Result<()> {
            self.items
                .lock()
                .unwrap()
                .retain(|i| i.natural_key() != natural_key);
            Ok(())
        }

        async fn replace_all(&self, _user_id: &str, items: &[PortfolioPosition]) -> Result<()> {
            *self.items.lock().unwrap() = items.to_vec();
            Ok(())
        }

        async fn last_modified_at(&self, _user_id: &str) -> Result<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    fn service() -> PortfolioService {
        PortfolioService::new(
            Arc::new(IntegrityStore::new(Arc::new(MemoryBackend::new()))),
            Arc::new(FakeRemote::default()),
            "u1",
        )
    }

    #[tokio::test]
    async fn upsert_replaces_existing_position_for_ticker() {
        let svc = service();
        svc.upsert(PortfolioPosition::new("AAPL", 10.0, 100.0, 110.0, "USD").unwrap())
            .await
            .unwrap();
        svc.upsert(PortfolioPosition::new("aapl", 20.0, 105.0, 110.0, "USD").unwrap())
            .await
            .unwrap();

        let positions = svc.list().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].shares, 20.0);
    }

    #[tokio::test]
    async fn totals_aggregate_derived_values() {
        let svc = service();
        svc.upsert(PortfolioPosition::new("AAPL", 10.0, 100.0, 110.0, "USD").unwrap())
            .await
            .unwrap();
        svc.upsert(PortfolioPosition::new("MSFT", 2.0, 300.0, 250.0, "USD").unwrap())
            .await
            .unwrap();

        let (market_value, unrealized) = svc.totals().unwrap();
        assert_eq!(market_value, 1100.0 + 500.0);
        assert_eq!(unrealized, 100.0 - 100.0);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let svc = service();
        svc.upsert(PortfolioPosition::new("NVDA", 1.0, 400.0, 500.0, "USD").unwrap())
            .await
            .unwrap();
        assert!(svc.remove("nvda").await.unwrap());
        assert!(!svc.remove("nvda").await.unwrap());
        assert!(svc.list().unwrap().is_empty());
    }
}
