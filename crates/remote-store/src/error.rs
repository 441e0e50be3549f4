//! Error types for the remote store client.

use thiserror::Error;

/// Result type alias for remote store operations.
pub type Result<T> = std::result::Result<T, RemoteStoreError>;

/// Retry policy class for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
}

/// Errors that can occur talking to the hosted store.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the hosted store
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl RemoteStoreError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy. Transport errors and server-side or
    /// contention statuses are worth retrying on the next sync; everything
    /// else is permanent until the request changes.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
                500..=599 => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Http(_) => RetryClass::Retryable,
            Self::Json(_) => RetryClass::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_contention_are_retryable() {
        assert_eq!(
            RemoteStoreError::api(503, "unavailable").retry_class(),
            RetryClass::Retryable
        );
        assert_eq!(
            RemoteStoreError::api(429, "slow down").retry_class(),
            RetryClass::Retryable
        );
    }

    #[test]
    fn client_errors_are_permanent() {
        assert_eq!(
            RemoteStoreError::api(400, "bad request").retry_class(),
            RetryClass::Permanent
        );
        assert_eq!(
            RemoteStoreError::api(404, "missing").retry_class(),
            RetryClass::Permanent
        );
    }
}
