//! Core error types for `apiwatch`.

use thiserror::Error;

/// Error type shared by the collaborator traits.
///
/// Repository, notifier, analyzer and locator implementations report their
/// failures through this type so the detection engine can log and degrade
/// without knowing which backend is behind the trait.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Revision storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A notification channel rejected or failed to deliver a message.
    #[error("Notification failed: {0}")]
    Notify(String),

    /// The AI analyzer failed or returned an unusable answer.
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data in a stored record or collaborator response.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
