//! Market data access for watchdeck.
//!
//! Defines the normalized [`Quote`] model and the [`MarketDataProvider`]
//! seam the alert engine polls through.

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::{MarketDataError, Result};
pub use models::{Quote, RawQuote};
pub use provider::{MarketDataProvider, RestQuoteProvider};
