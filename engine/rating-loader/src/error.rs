//! Error types for record loading and parameter parsing

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors raised while turning record files into rating matrices
#[derive(Error, Debug)]
pub enum LoaderError {
    /// I/O failure outside a single entity file (directory listing etc.)
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record line that cannot be parsed strictly
    #[error("{path:?} line {line}: {reason}")]
    Parse { path: PathBuf, line: usize, reason: String },

    /// No record directory exists for a category/discipline pair
    #[error("no record data: {0}")]
    MissingData(String),

    /// Rating and rank matrices disagree on dates or entity keys
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Invalid parameter handed to the loader
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LoaderError {
    pub fn parse(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse { path: path.into(), line, reason: reason.into() }
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }
}

/// Invalid configuration values, rejected before any data is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An enumeration token that is not recognized
    #[error("invalid {kind} value: '{value}'")]
    InvalidValue { kind: &'static str, value: String },

    /// A numeric parameter outside its permitted range
    #[error("{0}")]
    OutOfRange(String),

    /// Parameters that cannot be used together
    #[error("{0}")]
    Inconsistent(String),
}

impl ConfigError {
    pub fn invalid(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue { kind, value: value.into() }
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }
}
