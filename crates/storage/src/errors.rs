//! Error types for the local cache crate.

use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur against the local cache.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Stored bytes no longer match their recorded checksum. The offending
    /// entry has already been discarded by the time this is reported.
    #[error("integrity violation for key '{key}'")]
    IntegrityViolation { key: String },

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store I/O error
    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Create an integrity violation error for a key.
    pub fn integrity_violation(key: impl Into<String>) -> Self {
        Self::IntegrityViolation { key: key.into() }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Returns true when this is a checksum mismatch report.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::IntegrityViolation { .. })
    }
}
