//! The result of one logical fetch.

use crate::error::FetchError;

/// The result of one logical fetch.
///
/// Produced once per logical request and never mutated afterwards. Cloned
/// freely so coalesced callers can share one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Decoded body, if any was read.
    pub content: Option<String>,
    /// Final HTTP status, 0 when no response was received.
    pub status_code: u16,
    /// True only for a 200 response.
    pub succeeded: bool,
    /// Why the fetch failed, when it failed for a reason other than the status.
    pub error: Option<FetchError>,
    /// URL that was fetched.
    pub source_url: String,
    /// Network attempts made; 0 when the request failed closed.
    pub attempts: u32,
}

impl FetchOutcome {
    /// A completed response. `succeeded` follows the status.
    pub fn completed(url: &str, status: u16, content: String, attempts: u32) -> Self {
        Self {
            content: Some(content),
            status_code: status,
            succeeded: status == 200,
            error: None,
            source_url: url.to_string(),
            attempts,
        }
    }

    /// A failure carrying `error`.
    pub fn failure(url: &str, status: u16, error: FetchError, attempts: u32) -> Self {
        Self {
            content: None,
            status_code: status,
            succeeded: false,
            error: Some(error),
            source_url: url.to_string(),
            attempts,
        }
    }

    /// A failure decided before any network I/O.
    pub fn fail_closed(url: &str, error: FetchError) -> Self {
        Self::failure(url, 0, error, 0)
    }

    /// Content of a successful fetch.
    pub fn success_content(&self) -> Option<&str> {
        if self.succeeded {
            self.content.as_deref()
        } else {
            None
        }
    }

    /// Consumes the outcome, returning non-empty content of a successful fetch.
    pub fn into_content(self) -> Option<String> {
        if self.succeeded {
            self.content.filter(|c| !c.is_empty())
        } else {
            None
        }
    }

    /// Short reason for logs.
    pub fn failure_reason(&self) -> String {
        match (&self.error, self.status_code) {
            (Some(error), _) => error.to_string(),
            (None, 0) => "no response".to_string(),
            (None, status) => format!("HTTP {status}"),
        }
    }
}
