//! Core error taxonomy.
//!
//! Quota exhaustion is deliberately not represented here: hitting a plan
//! limit is a normal outcome value (see `limits` and the service `AddOutcome`
//! types), not a failure.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Local cache failure, including self-healed integrity violations.
    #[error("storage error: {0}")]
    Storage(#[from] watchdeck_storage::StorageError),

    /// Quote fetch failure for a single symbol.
    #[error("market data error: {0}")]
    MarketData(#[from] watchdeck_market_data::MarketDataError),

    /// The remote store could not be reached or rejected the request.
    /// Callers degrade to the last-known local cache.
    #[error("remote store unavailable: {message}")]
    RemoteUnavailable { message: String },

    /// A remote write failed mid-reconciliation. The collection's local
    /// state is untouched; reconciliation retries on next session start.
    #[error("reconciliation failed for '{collection}': {message}")]
    Reconciliation { collection: String, message: String },

    /// Every symbol fetch in a user-triggered refresh failed.
    #[error("market data feed unreachable")]
    FeedUnavailable,

    /// A caller supplied an invalid domain value (non-positive share count,
    /// empty ticker, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn remote_unavailable(message: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            message: message.into(),
        }
    }

    pub fn reconciliation(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reconciliation {
            collection: collection.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Actionable text for conditions the UI must surface. Recoverable
    /// conditions that degrade silently return `None`.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::RemoteUnavailable { .. } | Self::Reconciliation { .. } => {
                Some("Showing cached data. Your changes are saved locally and will sync shortly.".to_string())
            }
            Self::FeedUnavailable => {
                Some("Market data is currently unavailable. Please retry in a moment.".to_string())
            }
            _ => None,
        }
    }
}
