//! Store error types.

use apiwatch_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another process holds the lock file.
    #[error("Lock file {path} is held by pid {holder}")]
    Locked {
        /// Lock file path.
        path: PathBuf,
        /// Pid read from the lock file, or "unknown".
        holder: String,
    },

    /// Parse error.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(e) => CoreError::Serialization(e),
            StoreError::Config(msg) => CoreError::InvalidConfig(msg),
            StoreError::Parse(msg) => CoreError::InvalidData(msg),
            other => CoreError::Storage(other.to_string()),
        }
    }
}
