//! Portfolio positions.
//!
//! Positions mirror through the same cache/remote pair as the watchlist.
//! Market value and unrealized P&L are derived on read, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::sync::{normalize_ticker, NaturalKeyed};

mod service;

pub use service::{PortfolioService, PORTFOLIO_COLLECTION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPosition {
    pub id: String,
    pub ticker: String,
    pub shares: f64,
    pub avg_cost: f64,
    pub current_price: f64,
    pub currency: String,
    pub added_at: DateTime<Utc>,
}

impl PortfolioPosition {
    pub fn new(
        ticker: &str,
        shares: f64,
        avg_cost: f64,
        current_price: f64,
        currency: impl Into<String>,
    ) -> Result<Self> {
        let normalized = normalize_ticker(ticker);
        if normalized.is_empty() {
            return Err(Error::invalid_input("ticker must not be empty"));
        }
        if shares <= 0.0 {
            return Err(Error::invalid_input("shares must be positive"));
        }
        if avg_cost <= 0.0 {
            return Err(Error::invalid_input("average cost must be positive"));
        }
        if current_price < 0.0 {
            return Err(Error::invalid_input("current price must not be negative"));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            ticker: normalized,
            shares,
            avg_cost,
            current_price,
            currency: currency.into(),
            added_at: Utc::now(),
        })
    }

    pub fn market_value(&self) -> f64 {
        self.shares * self.current_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.market_value() - self.shares * self.avg_cost
    }
}

impl NaturalKeyed for PortfolioPosition {
    fn natural_key(&self) -> String {
        normalize_ticker(&self.ticker)
    }
}
