//! Error types for the cache layer

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while reading or writing cache artifacts
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact metadata (JSON sidecar) errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bincode serialization errors
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Artifact bytes that cannot be decoded
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Invalid operation for current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl CacheError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create a new invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}
