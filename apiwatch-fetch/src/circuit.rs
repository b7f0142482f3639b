//! Circuit breaker state for the paid proxy.
//!
//! Pure state machine: no I/O, no clock. The owning fetcher passes in
//! today's date and records what each request did.
//!
//! ```text
//! OPEN ──402──────────────────────────► DISABLED(payment-required)
//!  │                                         │
//!  └──10 consecutive failures──► DISABLED(consecutive-errors)
//!                                            │
//!             date rollover resets everything ┘
//! ```
//!
//! Independently of the global state, a domain that failed 3 times today is
//! blocked until rollover.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::{error, info, warn};

use crate::error::{DisableReason, FetchError};

/// Default per-domain failure threshold.
pub const DEFAULT_MAX_DOMAIN_FAILURES: u32 = 3;

/// Default global consecutive-failure threshold.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Thresholds for [`CircuitState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitConfig {
    /// Failures that block a single domain.
    pub max_domain_failures: u32,
    /// Failures in a row, across all domains, that disable the proxy.
    pub max_consecutive_errors: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            max_domain_failures: DEFAULT_MAX_DOMAIN_FAILURES,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

/// Day-scoped breaker state owned by one proxy fetcher.
#[derive(Debug, Clone)]
pub struct CircuitState {
    config: CircuitConfig,
    day: NaiveDate,
    disabled_reason: Option<DisableReason>,
    consecutive_errors: u32,
    domain_failures: HashMap<String, u32>,
    blocked_domains: BTreeSet<String>,
}

impl CircuitState {
    /// Creates an open breaker for `day`. Thresholds are clamped to at least 1.
    pub fn new(day: NaiveDate, config: CircuitConfig) -> Self {
        Self {
            config: CircuitConfig {
                max_domain_failures: config.max_domain_failures.max(1),
                max_consecutive_errors: config.max_consecutive_errors.max(1),
            },
            day,
            disabled_reason: None,
            consecutive_errors: 0,
            domain_failures: HashMap::new(),
            blocked_domains: BTreeSet::new(),
        }
    }

    /// Resets everything when `today` differs from the tracked day.
    ///
    /// Returns true if a reset happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if today == self.day {
            return false;
        }
        if self.disabled_reason.is_some() || !self.blocked_domains.is_empty() {
            info!(
                previous = %self.day,
                today = %today,
                "New day, re-enabling proxy and clearing domain blocks"
            );
        }
        self.day = today;
        self.disabled_reason = None;
        self.consecutive_errors = 0;
        self.domain_failures.clear();
        self.blocked_domains.clear();
        true
    }

    /// Checks whether a request to `domain` may proceed.
    pub fn admit(&self, domain: &str) -> Result<(), FetchError> {
        if let Some(reason) = self.disabled_reason {
            return Err(FetchError::CircuitOpen(reason));
        }
        if self.blocked_domains.contains(domain) {
            return Err(FetchError::DomainBlocked(domain.to_string()));
        }
        Ok(())
    }

    /// Records a 200 from `domain`.
    pub fn record_success(&mut self, domain: &str) {
        self.consecutive_errors = 0;
        self.domain_failures.remove(domain);
    }

    /// Records an exhausted failure against `domain`.
    pub fn record_failure(&mut self, domain: &str) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);

        let failures = self.domain_failures.entry(domain.to_string()).or_insert(0);
        *failures = failures.saturating_add(1);
        if *failures >= self.config.max_domain_failures && self.blocked_domains.insert(domain.to_string()) {
            warn!(domain, failures = *failures, "Domain blocked for the rest of the day");
        }

        if self.consecutive_errors >= self.config.max_consecutive_errors {
            self.disable(DisableReason::ConsecutiveErrors);
        }
    }

    /// Disables the proxy until rollover. The first reason wins.
    pub fn disable(&mut self, reason: DisableReason) {
        if self.disabled_reason.is_none() {
            error!(reason = %reason, consecutive_errors = self.consecutive_errors, "Proxy disabled");
            self.disabled_reason = Some(reason);
        }
    }

    /// Returns true while disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled_reason.is_some()
    }

    /// Why the proxy is disabled, if it is.
    pub fn disabled_reason(&self) -> Option<DisableReason> {
        self.disabled_reason
    }

    /// Failures in a row across all domains.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Failures recorded today for `domain`.
    pub fn domain_failures(&self, domain: &str) -> u32 {
        self.domain_failures.get(domain).copied().unwrap_or(0)
    }

    /// Domains blocked today, sorted.
    pub fn blocked_domains(&self) -> Vec<String> {
        self.blocked_domains.iter().cloned().collect()
    }

    /// The day this state belongs to.
    pub fn day(&self) -> NaiveDate {
        self.day
    }
}
