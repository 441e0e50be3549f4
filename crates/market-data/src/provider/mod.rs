//! Quote provider contract and implementations.

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::Quote;

pub mod rest;

pub use rest::RestQuoteProvider;

/// Per-symbol quote source. Implementations are shared behind `Arc` and
/// called concurrently, one in-flight request per symbol.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Stable identifier for logging.
    fn provider_id(&self) -> &'static str;

    /// Fetch the latest quote for one symbol. Missing optional fields in the
    /// provider response must be normalized, never surfaced as errors.
    async fn quote(&self, symbol: &str) -> Result<Quote>;
}
