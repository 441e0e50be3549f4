//! Watchlist domain model and service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::sync::{normalize_ticker, NaturalKeyed};

mod service;

pub use service::{AddOutcome, WatchlistService, WATCHLIST_COLLECTION};

/// One tracked symbol in a user's watchlist. The normalized ticker is unique
/// within a collection; entries differing only by case or whitespace are the
/// same entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedSymbol {
    pub id: String,
    pub ticker: String,
    pub display_name: String,
    pub market: String,
    pub last_known_price: f64,
    pub last_known_change_percent: f64,
    pub currency: String,
    pub exchange: String,
    pub added_at: DateTime<Utc>,
}

impl WatchedSymbol {
    /// Build a new entry with a normalized ticker and a fresh id.
    pub fn new(
        ticker: &str,
        display_name: impl Into<String>,
        market: impl Into<String>,
        currency: impl Into<String>,
        exchange: impl Into<String>,
    ) -> Result<Self> {
        let normalized = normalize_ticker(ticker);
        if normalized.is_empty() {
            return Err(Error::invalid_input("ticker must not be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            ticker: normalized,
            display_name: display_name.into(),
            market: market.into(),
            last_known_price: 0.0,
            last_known_change_percent: 0.0,
            currency: currency.into(),
            exchange: exchange.into(),
            added_at: Utc::now(),
        })
    }
}

impl NaturalKeyed for WatchedSymbol {
    fn natural_key(&self) -> String {
        normalize_ticker(&self.ticker)
    }
}
