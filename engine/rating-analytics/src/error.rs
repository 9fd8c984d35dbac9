//! Error types for the analytics engine

use rating_cache::CacheError;
use rating_loader::{ConfigError, LoaderError};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced to callers of the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid or inconsistent parameters, detected before any data is read
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Loading or validating record data failed
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Reading or writing a cache artifact failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration file could not be read or parsed
    #[error("config file error: {0}")]
    ConfigFile(String),
}

impl EngineError {
    pub fn config_file(msg: impl Into<String>) -> Self {
        Self::ConfigFile(msg.into())
    }
}
