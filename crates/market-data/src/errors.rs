//! Error types for market data providers.

use thiserror::Error;

/// Result type alias for market data operations.
pub type Result<T> = std::result::Result<T, MarketDataError>;

/// Errors that can occur while fetching quotes.
#[derive(Debug, Error)]
pub enum MarketDataError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an unusable response
    #[error("provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    /// The provider does not know the symbol
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    /// The fetch did not complete within the per-symbol budget
    #[error("quote fetch timed out for {0}")]
    Timeout(String),
}

impl MarketDataError {
    /// Create a provider error from a provider id and message.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
