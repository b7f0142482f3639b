//! Fetching through the paid rendering proxy.
//!
//! Every request costs money, so this path is guarded three ways before any
//! I/O happens: the [`CircuitState`] (global disable and per-domain blocks),
//! then the shared daily quota. Checks run in that order after a date
//! rollover check.

use apiwatch_core::{local_date_source, DateSource, QuotaLedger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::body::{BodyError, BoundedBodyReader, DEFAULT_MAX_RESPONSE_BYTES};
use crate::circuit::{CircuitConfig, CircuitState};
use crate::direct::fault_error;
use crate::error::{DisableReason, FetchError, TransportFault};
use crate::outcome::FetchOutcome;
use crate::retry::{RetryCause, RetryDecision, RetryPolicy, PROXY_RETRYABLE_STATUSES};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportSettings};
use crate::urls::domain_of;

/// Default proxy endpoint.
pub const DEFAULT_PROXY_ENDPOINT: &str = "https://api.zenrows.com/v1/";

/// Default quota service name.
pub const DEFAULT_PROXY_SERVICE: &str = "zenrows";

/// Default daily request limit.
pub const DEFAULT_PROXY_DAILY_LIMIT: i64 = 2000;

// ============================================================================
// Configuration
// ============================================================================

/// Settings for [`ProxyFetcher`].
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy API key. Empty means the proxy is not configured.
    pub api_key: String,
    /// Proxy endpoint URL.
    pub endpoint: String,
    /// Total timeout per proxy request.
    pub timeout: Duration,
    /// Total attempts per logical request.
    pub max_retries: u32,
    /// Delay after the first failed attempt; doubles afterwards.
    pub retry_delay: Duration,
    /// Requests allowed per day. Negative is unlimited, zero disables.
    pub daily_limit: i64,
    /// Ask the proxy to render JavaScript.
    pub js_render: bool,
    /// Ask the proxy to use its anti-bot bypass.
    pub antibot: bool,
    /// Body ceiling in bytes.
    pub max_response_bytes: u64,
    /// Breaker thresholds.
    pub circuit: CircuitConfig,
    /// Name the quota ledger tracks this proxy under.
    pub service_name: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 1,
            retry_delay: Duration::from_secs(2),
            daily_limit: DEFAULT_PROXY_DAILY_LIMIT,
            js_render: true,
            antibot: false,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            circuit: CircuitConfig::default(),
            service_name: DEFAULT_PROXY_SERVICE.to_string(),
        }
    }
}

impl ProxyConfig {
    /// Returns true if an API key is set.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
            .with_initial_delay(self.retry_delay)
            .with_multiplier(2.0)
            .with_statuses(PROXY_RETRYABLE_STATUSES)
    }
}

/// Proxy features requested per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProxyFeatures {
    /// Render JavaScript.
    pub js_render: bool,
    /// Residential proxy pool. The fetchers never set it.
    pub premium_proxy: bool,
    /// Anti-bot bypass.
    pub antibot: bool,
}

impl ProxyFeatures {
    /// Features from configuration. Premium proxy stays off.
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            js_render: config.js_render,
            premium_proxy: false,
            antibot: config.antibot,
        }
    }

    /// The same features without JavaScript rendering.
    pub fn without_js(self) -> Self {
        Self {
            js_render: false,
            ..self
        }
    }
}

/// How a call treats the daily quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaMode {
    /// Reserve one unit before the first network attempt.
    Consume,
    /// Only check that a unit is available.
    CheckOnly,
}

/// Snapshot of proxy state for status output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProxyStats {
    /// True while the circuit is disabled.
    pub disabled: bool,
    /// Why it is disabled.
    pub disabled_reason: Option<DisableReason>,
    /// Requests counted today.
    pub today_count: u64,
    /// Configured daily limit.
    pub limit: i64,
    /// Failures in a row across all domains.
    pub consecutive_errors: u32,
    /// Domains blocked today.
    pub blocked_domains: Vec<String>,
}

// ============================================================================
// Proxy Fetcher
// ============================================================================

/// Fetches pages through the paid proxy.
pub struct ProxyFetcher {
    transport: Arc<dyn Transport>,
    config: ProxyConfig,
    policy: RetryPolicy,
    reader: BoundedBodyReader,
    quota: Arc<dyn QuotaLedger>,
    circuit: Mutex<CircuitState>,
    today: DateSource,
}

impl ProxyFetcher {
    /// Creates a fetcher with its own `reqwest` transport.
    pub fn new(config: ProxyConfig, quota: Arc<dyn QuotaLedger>) -> Result<Self, FetchError> {
        let settings = TransportSettings {
            timeout: config.timeout,
            ..TransportSettings::default()
        };
        let transport = HttpTransport::new(&settings)?;
        Ok(Self::with_transport(Arc::new(transport), config, quota))
    }

    /// Creates a fetcher over an existing transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        config: ProxyConfig,
        quota: Arc<dyn QuotaLedger>,
    ) -> Self {
        let today = local_date_source();
        Self {
            transport,
            policy: config.retry_policy(),
            reader: BoundedBodyReader::new(config.max_response_bytes),
            circuit: Mutex::new(CircuitState::new(today(), config.circuit)),
            config,
            quota,
            today,
        }
    }

    /// Replaces the date source used for rollover.
    pub fn with_date_source(mut self, today: DateSource) -> Self {
        self.circuit = Mutex::new(CircuitState::new(today(), self.config.circuit));
        self.today = today;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Returns true if the circuit is open and one more call fits the quota.
    pub async fn can_use_quota(&self) -> bool {
        {
            let mut circuit = self.circuit.lock().await;
            circuit.roll_over((self.today)());
            if circuit.is_disabled() {
                return false;
            }
        }
        self.quota
            .can_use(&self.config.service_name, self.config.daily_limit)
            .await
    }

    /// Current state for status output.
    pub async fn stats(&self) -> ProxyStats {
        let (disabled_reason, consecutive_errors, blocked_domains) = {
            let mut circuit = self.circuit.lock().await;
            circuit.roll_over((self.today)());
            (
                circuit.disabled_reason(),
                circuit.consecutive_errors(),
                circuit.blocked_domains(),
            )
        };
        ProxyStats {
            disabled: disabled_reason.is_some(),
            disabled_reason,
            today_count: self.quota.usage(&self.config.service_name).await,
            limit: self.config.daily_limit,
            consecutive_errors,
            blocked_domains,
        }
    }

    /// Fetches `url` through the proxy.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str, features: ProxyFeatures, mode: QuotaMode) -> FetchOutcome {
        let domain = domain_of(url);

        {
            let mut circuit = self.circuit.lock().await;
            circuit.roll_over((self.today)());
            if let Err(err) = circuit.admit(&domain) {
                debug!(error = %err, "Proxy call refused");
                return FetchOutcome::fail_closed(url, err);
            }
        }

        let service = self.config.service_name.as_str();
        let limit = self.config.daily_limit;
        let admitted = match mode {
            QuotaMode::Consume => self.quota.try_increment(service, limit, 1).await,
            QuotaMode::CheckOnly => self.quota.can_use(service, limit).await,
        };
        if !admitted {
            warn!(service, limit, "Daily proxy quota exhausted");
            return FetchOutcome::fail_closed(
                url,
                FetchError::QuotaExceeded {
                    service: service.to_string(),
                    limit,
                },
            );
        }

        let request = self.build_request(url, features);
        let mut last_status: u16 = 0;
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                if let Some(reason) = self.circuit.lock().await.disabled_reason() {
                    return FetchOutcome::failure(url, last_status, FetchError::CircuitOpen(reason), attempt);
                }
            }
            attempt += 1;
            debug!(attempt, js_render = features.js_render, "Proxy attempt");

            let fault = match self.transport.get(&request).await {
                Ok(response) => {
                    let status = response.status;
                    match status {
                        402 => {
                            self.circuit.lock().await.disable(DisableReason::PaymentRequired);
                            return FetchOutcome::failure(
                                url,
                                402,
                                FetchError::CircuitOpen(DisableReason::PaymentRequired),
                                attempt,
                            );
                        }
                        429 => {
                            warn!("Proxy rate limited");
                            return FetchOutcome::failure(url, 429, FetchError::RateLimited, attempt);
                        }
                        _ => {}
                    }

                    match self.reader.read(response).await {
                        Ok(content) if status == 200 => {
                            self.circuit.lock().await.record_success(&domain);
                            info!(bytes = content.len(), attempts = attempt, "Proxy fetch succeeded");
                            return FetchOutcome::completed(url, status, content, attempt);
                        }
                        Ok(_) => {
                            let cause = RetryCause::Status(status);
                            match self.policy.next_delay(attempt, cause) {
                                RetryDecision::Retry(delay) => {
                                    warn!(status, attempt, delay_ms = delay.as_millis() as u64, "Proxy error, retrying");
                                    last_status = status;
                                    tokio::time::sleep(delay).await;
                                    continue;
                                }
                                RetryDecision::GiveUp if self.policy.is_retryable(cause) => {
                                    error!(status, attempts = attempt, "Proxy server error after retries");
                                    self.circuit.lock().await.record_failure(&domain);
                                }
                                RetryDecision::GiveUp => {
                                    warn!(status, "Proxy returned failing status");
                                }
                            }
                            return FetchOutcome::failure(url, status, FetchError::HttpStatus(status), attempt);
                        }
                        Err(BodyError::TooLarge { limit, observed }) => {
                            warn!(limit, observed, "Proxy response too large");
                            return FetchOutcome::failure(
                                url,
                                status,
                                FetchError::ResponseTooLarge { limit, observed },
                                attempt,
                            );
                        }
                        Err(BodyError::Transport(fault)) => fault,
                    }
                }
                Err(fault) => fault,
            };
            let fault = self.redact(fault);

            if let Some(delay) = self.retry_after_fault(attempt, &fault) {
                warn!(error = %fault, attempt, delay_ms = delay.as_millis() as u64, "Proxy network error, retrying");
                last_status = 0;
                tokio::time::sleep(delay).await;
                continue;
            }

            error!(error = %fault, attempts = attempt, "Proxy network error");
            self.circuit.lock().await.record_failure(&domain);
            return FetchOutcome::failure(url, 0, fault_error(&fault), attempt);
        }
    }

    /// Two-step fetch: full features and quota first, then without
    /// JavaScript rendering against a read-only quota check.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_with_fallback(&self, url: &str) -> FetchOutcome {
        let features = ProxyFeatures::from_config(&self.config);
        let first = self.fetch(url, features, QuotaMode::Consume).await;
        if first.success_content().is_some_and(|c| !c.is_empty()) {
            return first;
        }
        if first.error.as_ref().is_some_and(FetchError::is_fail_closed) {
            return first;
        }

        info!(reason = %first.failure_reason(), "Retrying proxy without JS rendering");
        self.fetch(url, features.without_js(), QuotaMode::CheckOnly).await
    }

    fn build_request(&self, url: &str, features: ProxyFeatures) -> TransportRequest {
        let mut request = TransportRequest::get(self.config.endpoint.as_str())
            .with_query("apikey", self.config.api_key.as_str())
            .with_query("url", url)
            .with_timeout(self.config.timeout);
        if features.js_render {
            request = request.with_query("js_render", "true");
        }
        if features.premium_proxy {
            request = request.with_query("premium_proxy", "true");
        }
        if features.antibot {
            request = request.with_query("antibot", "true");
        }
        request
    }

    /// Masks the API key in a fault message.
    fn redact(&self, mut fault: TransportFault) -> TransportFault {
        let key = self.config.api_key.as_str();
        if !key.is_empty() && fault.message.contains(key) {
            fault.message = fault.message.replace(key, "***");
        }
        fault
    }

    fn retry_after_fault(&self, attempt: u32, fault: &TransportFault) -> Option<Duration> {
        match self.policy.next_delay(attempt, RetryCause::Fault(fault.kind)) {
            RetryDecision::Retry(delay) => Some(delay),
            RetryDecision::GiveUp => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use crate::transport::mock::{Scripted, ScriptedTransport};
    use apiwatch_core::ManualDate;
    use apiwatch_store::QuotaTracker;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    struct Harness {
        transport: Arc<ScriptedTransport>,
        tracker: Arc<QuotaTracker>,
        date: ManualDate,
        fetcher: Arc<ProxyFetcher>,
        _dir: TempDir,
    }

    fn start_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn harness(transport: ScriptedTransport, config: ProxyConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(start_day());
        let tracker = Arc::new(QuotaTracker::new(dir.path().join("quota.json"), date.source()));
        let transport = Arc::new(transport);
        let fetcher = ProxyFetcher::with_transport(transport.clone(), config, tracker.clone())
            .with_date_source(date.source());
        Harness {
            transport,
            tracker,
            date,
            fetcher: Arc::new(fetcher),
            _dir: dir,
        }
    }

    fn config() -> ProxyConfig {
        ProxyConfig {
            api_key: "test-key".into(),
            endpoint: "https://proxy.test/v1/".into(),
            retry_delay: Duration::ZERO,
            ..ProxyConfig::default()
        }
    }

    fn features() -> ProxyFeatures {
        ProxyFeatures::from_config(&config())
    }

    async fn consume(h: &Harness, url: &str) -> FetchOutcome {
        h.fetcher.fetch(url, features(), QuotaMode::Consume).await
    }

    #[tokio::test]
    async fn test_request_carries_key_url_and_features() {
        let h = harness(ScriptedTransport::ok("<html>rendered</html>"), config());
        let outcome = consume(&h, "https://docs.example.com/api").await;

        assert!(outcome.succeeded);
        let requests = h.transport.requests();
        assert_eq!(requests[0].url, "https://proxy.test/v1/");
        assert_eq!(requests[0].query_value("apikey"), Some("test-key"));
        assert_eq!(requests[0].query_value("url"), Some("https://docs.example.com/api"));
        assert_eq!(requests[0].query_value("js_render"), Some("true"));
        assert_eq!(requests[0].query_value("premium_proxy"), None);
        assert_eq!(requests[0].query_value("antibot"), None);
        assert_eq!(h.tracker.get_usage("zenrows").await, 1);
    }

    #[tokio::test]
    async fn test_network_error_never_exposes_api_key() {
        let message = "error sending request for url \
            (https://proxy.test/v1/?apikey=test-key&url=https%3A%2F%2Fdocs.example.com%2F)";
        let h = harness(
            ScriptedTransport::always(Scripted::FaultWithMessage(FaultKind::Connect, message.into())),
            config(),
        );

        let outcome = consume(&h, "https://docs.example.com/").await;
        assert!(!outcome.succeeded);
        let reason = outcome.failure_reason();
        assert!(!reason.contains("test-key"), "key leaked: {reason}");
        assert!(reason.contains("apikey=***"));
    }

    #[tokio::test]
    async fn test_daily_limit_holds_under_concurrency() {
        let h = harness(
            ScriptedTransport::ok("ok"),
            ProxyConfig {
                daily_limit: 5,
                ..config()
            },
        );

        let calls = (0..8).map(|i| {
            let fetcher = h.fetcher.clone();
            tokio::spawn(async move {
                fetcher
                    .fetch(&format!("https://site{i}.com/"), features(), QuotaMode::Consume)
                    .await
            })
        });
        let outcomes: Vec<FetchOutcome> = futures::future::join_all(calls)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
        let refused = outcomes
            .iter()
            .filter(|o| matches!(o.error, Some(FetchError::QuotaExceeded { .. })))
            .count();
        assert_eq!(succeeded, 5);
        assert_eq!(refused, 3);
        assert_eq!(h.transport.calls(), 5);
        assert_eq!(h.tracker.get_usage("zenrows").await, 5);

        let after = consume(&h, "https://late.com/").await;
        assert!(matches!(after.error, Some(FetchError::QuotaExceeded { .. })));
        assert_eq!(h.transport.calls(), 5);
    }

    #[tokio::test]
    async fn test_payment_required_disables_until_rollover() {
        let h = harness(
            ScriptedTransport::new(vec![
                Scripted::Status(402, "payment required".into()),
                Scripted::Status(200, "ok".into()),
            ]),
            config(),
        );

        let first = consume(&h, "https://a.com/").await;
        assert_eq!(first.status_code, 402);
        assert_eq!(
            first.error,
            Some(FetchError::CircuitOpen(DisableReason::PaymentRequired))
        );

        let second = consume(&h, "https://b.com/").await;
        assert_eq!(
            second.error,
            Some(FetchError::CircuitOpen(DisableReason::PaymentRequired))
        );
        assert_eq!(second.attempts, 0);
        assert_eq!(h.transport.calls(), 1);
        assert!(!h.fetcher.can_use_quota().await);

        h.date.set(start_day().succ_opt().unwrap());
        let next_day = consume(&h, "https://b.com/").await;
        assert!(next_day.succeeded);
        assert_eq!(h.transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried() {
        let h = harness(
            ScriptedTransport::always(Scripted::Status(429, "slow down".into())),
            ProxyConfig {
                max_retries: 3,
                ..config()
            },
        );

        let outcome = consume(&h, "https://a.com/").await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.status_code, 429);
        assert_eq!(outcome.error, Some(FetchError::RateLimited));
        assert_eq!(h.transport.calls(), 1);

        let stats = h.fetcher.stats().await;
        assert_eq!(stats.consecutive_errors, 0);
        assert!(!stats.disabled);
    }

    #[tokio::test]
    async fn test_domain_blocked_after_three_failures() {
        let h = harness(
            ScriptedTransport::always(Scripted::Status(503, "down".into())),
            config(),
        );

        for _ in 0..3 {
            let outcome = consume(&h, "https://flaky.com/page").await;
            assert_eq!(outcome.error, Some(FetchError::HttpStatus(503)));
        }
        assert_eq!(h.transport.calls(), 3);

        let blocked = consume(&h, "https://flaky.com/other").await;
        assert_eq!(blocked.error, Some(FetchError::DomainBlocked("flaky.com".into())));
        assert_eq!(h.transport.calls(), 3);

        let other = consume(&h, "https://fine.com/").await;
        assert_eq!(other.error, Some(FetchError::HttpStatus(503)));
        assert_eq!(h.transport.calls(), 4);

        assert_eq!(h.fetcher.stats().await.blocked_domains, vec!["flaky.com".to_string()]);
    }

    #[tokio::test]
    async fn test_consecutive_errors_disable_proxy() {
        let h = harness(
            ScriptedTransport::always(Scripted::Fault(FaultKind::Timeout)),
            config(),
        );

        for i in 0..10 {
            let outcome = consume(&h, &format!("https://d{i}.com/")).await;
            assert!(matches!(outcome.error, Some(FetchError::TransientNetwork(_))));
        }
        assert_eq!(h.transport.calls(), 10);

        let fresh = consume(&h, "https://brand-new.com/").await;
        assert_eq!(
            fresh.error,
            Some(FetchError::CircuitOpen(DisableReason::ConsecutiveErrors))
        );
        assert_eq!(h.transport.calls(), 10);
    }

    #[tokio::test]
    async fn test_not_found_leaves_circuit_alone() {
        let h = harness(
            ScriptedTransport::always(Scripted::Status(404, "missing".into())),
            config(),
        );
        for _ in 0..4 {
            let outcome = consume(&h, "https://a.com/").await;
            assert_eq!(outcome.error, Some(FetchError::HttpStatus(404)));
            assert!(outcome.content.is_none());
        }
        assert_eq!(h.transport.calls(), 4);
        assert_eq!(h.fetcher.stats().await.consecutive_errors, 0);
    }

    #[tokio::test]
    async fn test_retry_consumes_quota_once() {
        let h = harness(
            ScriptedTransport::new(vec![
                Scripted::Status(502, "bad gateway".into()),
                Scripted::Status(200, "ok".into()),
            ]),
            ProxyConfig {
                max_retries: 2,
                ..config()
            },
        );

        let outcome = consume(&h, "https://a.com/").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(h.tracker.get_usage("zenrows").await, 1);
    }

    #[tokio::test]
    async fn test_success_resets_streak() {
        let h = harness(
            ScriptedTransport::new(vec![
                Scripted::Status(500, "x".into()),
                Scripted::Status(500, "x".into()),
                Scripted::Status(200, "ok".into()),
            ]),
            config(),
        );
        consume(&h, "https://a.com/").await;
        consume(&h, "https://a.com/").await;
        assert_eq!(h.fetcher.stats().await.consecutive_errors, 2);

        assert!(consume(&h, "https://a.com/").await.succeeded);
        assert_eq!(h.fetcher.stats().await.consecutive_errors, 0);
    }

    #[tokio::test]
    async fn test_fallback_drops_js_and_keeps_quota() {
        let h = harness(
            ScriptedTransport::new(vec![
                Scripted::Status(500, "render failed".into()),
                Scripted::Status(200, "plain".into()),
            ]),
            config(),
        );

        let outcome = h.fetcher.fetch_with_fallback("https://a.com/").await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.content.as_deref(), Some("plain"));

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].query_value("js_render"), Some("true"));
        assert_eq!(requests[1].query_value("js_render"), None);
        assert_eq!(h.tracker.get_usage("zenrows").await, 1);
    }

    #[tokio::test]
    async fn test_fallback_skipped_when_failed_closed() {
        let h = harness(
            ScriptedTransport::ok("ok"),
            ProxyConfig {
                daily_limit: 0,
                ..config()
            },
        );

        let outcome = h.fetcher.fetch_with_fallback("https://a.com/").await;
        assert!(matches!(outcome.error, Some(FetchError::QuotaExceeded { .. })));
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_too_large_leaves_circuit_alone() {
        let h = harness(
            ScriptedTransport::always(Scripted::Chunked {
                status: 200,
                content_length: Some("50".into()),
                chunks: vec![],
            }),
            ProxyConfig {
                max_response_bytes: 10,
                ..config()
            },
        );

        let outcome = consume(&h, "https://a.com/").await;
        assert!(matches!(outcome.error, Some(FetchError::ResponseTooLarge { .. })));
        assert_eq!(h.fetcher.stats().await.consecutive_errors, 0);
    }
}
