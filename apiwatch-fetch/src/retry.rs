//! Retry policy for HTTP requests.
//!
//! The policy is a pure function of the attempt number and what went wrong.
//! Fetchers ask it for the next delay and do the sleeping themselves.

use std::time::Duration;

use crate::error::FaultKind;

/// Statuses the direct fetcher retries.
pub const DIRECT_RETRYABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Statuses the proxy fetcher retries. 402 and 429 are handled before the
/// policy is consulted.
pub const PROXY_RETRYABLE_STATUSES: &[u16] = &[500, 502, 503, 504];

/// Upper bound on any single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// What went wrong on an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    /// Upstream answered with this status.
    Status(u16),
    /// The transport failed.
    Fault(FaultKind),
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then try again.
    Retry(Duration),
    /// Stop and report the failure.
    GiveUp,
}

/// Exponential backoff over a fixed set of retryable causes.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Factor applied to the delay after every retryable failure.
    pub multiplier: f64,
    /// Statuses worth another attempt.
    pub retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Creates a policy retrying [`DIRECT_RETRYABLE_STATUSES`].
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            retryable_statuses: DIRECT_RETRYABLE_STATUSES.to_vec(),
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the retryable statuses.
    pub fn with_statuses(mut self, statuses: &[u16]) -> Self {
        self.retryable_statuses = statuses.to_vec();
        self
    }

    /// The same policy limited to a single attempt.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..self.clone()
        }
    }

    /// Returns true if `cause` is worth another attempt.
    pub fn is_retryable(&self, cause: RetryCause) -> bool {
        match cause {
            RetryCause::Status(status) => self.retryable_statuses.contains(&status),
            RetryCause::Fault(kind) => kind.is_retryable(),
        }
    }

    /// Backoff before the attempt following `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if secs.is_finite() && secs < MAX_DELAY.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            MAX_DELAY
        }
    }

    /// Decides what follows failed attempt number `attempt` (1-based).
    pub fn next_delay(&self, attempt: u32, cause: RetryCause) -> RetryDecision {
        if attempt >= self.max_attempts || !self.is_retryable(cause) {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay_for_attempt(attempt))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::new(10);

        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(8));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(10).with_initial_delay(Duration::from_secs(10));

        // Should be capped at 60 seconds
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(60));
    }

    #[test]
    fn test_gives_up_after_last_attempt() {
        let policy = RetryPolicy::new(3);
        let cause = RetryCause::Status(503);

        assert_eq!(policy.next_delay(1, cause), RetryDecision::Retry(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(2, cause), RetryDecision::Retry(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(3, cause), RetryDecision::GiveUp);
    }

    #[test]
    fn test_non_retryable_causes() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.next_delay(1, RetryCause::Status(404)), RetryDecision::GiveUp);
        assert_eq!(
            policy.next_delay(1, RetryCause::Fault(FaultKind::InvalidRequest)),
            RetryDecision::GiveUp
        );
        assert!(matches!(
            policy.next_delay(1, RetryCause::Fault(FaultKind::Timeout)),
            RetryDecision::Retry(_)
        ));
    }

    #[test]
    fn test_proxy_statuses_exclude_429() {
        let policy = RetryPolicy::new(2).with_statuses(PROXY_RETRYABLE_STATUSES);
        assert!(!policy.is_retryable(RetryCause::Status(429)));
        assert!(policy.is_retryable(RetryCause::Status(502)));
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let policy = RetryPolicy::default().single_attempt();
        assert_eq!(policy.next_delay(1, RetryCause::Status(503)), RetryDecision::GiveUp);
    }

    #[test]
    fn test_custom_multiplier() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(500))
            .with_multiplier(3.0);
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4500));
    }
}
