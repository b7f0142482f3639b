//! Fetch error types.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Why a logical fetch failed.
///
/// Carried inside [`crate::FetchOutcome`], which coalesced callers share, so
/// every variant is cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Timeout, reset or disconnect that survived every retry.
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// Upstream answered 429. Never retried.
    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    /// The daily quota for a paid service is used up. No request was sent.
    #[error("Daily quota exceeded for {service} (limit {limit})")]
    QuotaExceeded {
        /// Service name.
        service: String,
        /// Configured daily limit.
        limit: i64,
    },

    /// The proxy circuit is open. No request was sent.
    #[error("Proxy disabled: {0}")]
    CircuitOpen(DisableReason),

    /// The domain failed too often today. No request was sent.
    #[error("Domain blocked: {0}")]
    DomainBlocked(String),

    /// Body exceeded the configured ceiling. Never retried.
    #[error("Response too large: {observed} bytes > {limit}")]
    ResponseTooLarge {
        /// Configured ceiling in bytes.
        limit: u64,
        /// Advertised or accumulated size when reading stopped.
        observed: u64,
    },

    /// Body arrived but is not usable content (error page, empty, ...).
    #[error("Invalid content: {0}")]
    ContentInvalid(String),

    /// Body could not be decoded or parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Non-retryable transport failure (bad request, TLS, ...).
    #[error("Client error: {0}")]
    Client(String),

    /// Upstream answered with a failing status after every retry.
    #[error("HTTP status {0}")]
    HttpStatus(u16),
}

impl FetchError {
    /// Returns true for failures decided locally, without any network I/O.
    pub fn is_fail_closed(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. } | Self::CircuitOpen(_) | Self::DomainBlocked(_)
        )
    }
}

// ============================================================================
// Disable Reason
// ============================================================================

/// Why the proxy circuit disabled itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisableReason {
    /// The proxy answered 402: the account is out of credit.
    PaymentRequired,
    /// Too many failures in a row across all domains.
    ConsecutiveErrors,
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentRequired => f.write_str("payment-required"),
            Self::ConsecutiveErrors => f.write_str("consecutive-errors"),
        }
    }
}

// ============================================================================
// Transport Fault
// ============================================================================

/// Classification of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Connect or total timeout elapsed.
    Timeout,
    /// Could not establish a connection.
    Connect,
    /// Peer reset the connection.
    ConnectionReset,
    /// Server closed the connection mid-request.
    ServerDisconnect,
    /// The request itself was malformed.
    InvalidRequest,
    /// Anything else.
    Other,
}

impl FaultKind {
    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect | Self::ConnectionReset | Self::ServerDisconnect
        )
    }
}

/// A transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct TransportFault {
    /// Classification.
    pub kind: FaultKind,
    /// Description from the underlying client.
    pub message: String,
}

impl TransportFault {
    /// Creates a fault.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportFault {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FaultKind::Timeout
        } else if err.is_builder() {
            FaultKind::InvalidRequest
        } else if io_error_kind(&err) == Some(std::io::ErrorKind::ConnectionReset) {
            FaultKind::ConnectionReset
        } else if err.is_connect() {
            FaultKind::Connect
        } else if err.is_request() || err.is_body() {
            FaultKind::ServerDisconnect
        } else {
            FaultKind::Other
        };

        // The URL can carry credentials in its query string.
        Self::new(kind, err.without_url().to_string())
    }
}

/// Finds an `io::Error` in the source chain.
fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut current = err.source();
    while let Some(source) = current {
        if let Some(io) = source.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        current = source.source();
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
