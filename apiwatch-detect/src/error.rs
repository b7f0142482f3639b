//! Detection error types.

use apiwatch_core::CoreError;
use apiwatch_fetch::FetchError;
use thiserror::Error;

/// Errors raised by the detection engine and the watcher.
#[derive(Debug, Error)]
pub enum DetectError {
    /// A fetched document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A collaborator failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Fetching failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The watch targets file is malformed.
    #[error("Invalid targets file: {0}")]
    InvalidTargets(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectError {
    /// Returns true if the error came from parsing fetched content.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Fetch(FetchError::Parse(_)))
    }
}
