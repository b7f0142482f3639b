//! Direct HTTP fetching with exponential backoff.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::body::{BodyError, BoundedBodyReader, DEFAULT_MAX_RESPONSE_BYTES};
use crate::error::{FetchError, TransportFault};
use crate::outcome::FetchOutcome;
use crate::retry::{RetryCause, RetryDecision, RetryPolicy, DIRECT_RETRYABLE_STATUSES};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportSettings};

/// Settings for [`DirectFetcher`].
#[derive(Debug, Clone)]
pub struct DirectConfig {
    /// Transport settings (timeouts, user agent).
    pub transport: TransportSettings,
    /// Total attempts per fetch.
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub retry_delay: Duration,
    /// Delay growth factor.
    pub retry_multiplier: f64,
    /// Body ceiling in bytes.
    pub max_response_bytes: u64,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            retry_multiplier: 2.0,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl DirectConfig {
    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
            .with_initial_delay(self.retry_delay)
            .with_multiplier(self.retry_multiplier)
            .with_statuses(DIRECT_RETRYABLE_STATUSES)
    }
}

/// General-purpose retrying HTTP client.
pub struct DirectFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    reader: BoundedBodyReader,
}

impl DirectFetcher {
    /// Creates a fetcher with its own `reqwest` transport.
    pub fn new(config: &DirectConfig) -> Result<Self, FetchError> {
        let transport = HttpTransport::new(&config.transport)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Creates a fetcher over an existing transport.
    pub fn with_transport(transport: Arc<dyn Transport>, config: &DirectConfig) -> Self {
        Self {
            transport,
            policy: config.retry_policy(),
            reader: BoundedBodyReader::new(config.max_response_bytes),
        }
    }

    /// Fetches `url`. With `allow_retry = false` exactly one attempt is made.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str, allow_retry: bool) -> FetchOutcome {
        let policy = if allow_retry {
            self.policy.clone()
        } else {
            self.policy.single_attempt()
        };
        let request = TransportRequest::get(url);

        let mut last_status: u16 = 0;
        let mut last_error: Option<FetchError> = None;
        let mut attempt: u32 = 0;

        while attempt < policy.max_attempts {
            attempt += 1;
            debug!(attempt, max_attempts = policy.max_attempts, "Direct fetch attempt");

            let fault = match self.transport.get(&request).await {
                Ok(response) => {
                    let status = response.status;
                    match self.reader.read(response).await {
                        Ok(content) => {
                            let cause = RetryCause::Status(status);
                            if let RetryDecision::Retry(delay) = policy.next_delay(attempt, cause) {
                                warn!(
                                    status,
                                    attempt,
                                    delay_ms = delay.as_millis() as u64,
                                    "Retryable status, backing off"
                                );
                                last_status = status;
                                last_error = Some(FetchError::HttpStatus(status));
                                tokio::time::sleep(delay).await;
                                continue;
                            }
                            return FetchOutcome::completed(url, status, content, attempt);
                        }
                        Err(BodyError::TooLarge { limit, observed }) => {
                            warn!(status, limit, observed, "Response too large");
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

            match self.on_fault(&policy, attempt, &fault).await {
                Some(()) => {
                    last_status = 0;
                    last_error = Some(FetchError::TransientNetwork(fault.message));
                }
                None => {
                    return FetchOutcome::failure(
                        url,
                        0,
                        fault_error(&fault),
                        attempt,
                    );
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            FetchError::TransientNetwork("max retries exceeded".to_string())
        });
        error!(attempts = attempt, error = %error, "Fetch failed after retries");
        FetchOutcome::failure(url, last_status, error, attempt)
    }

    /// Sleeps before the next attempt if the fault allows one.
    ///
    /// Returns `None` when the caller should stop immediately: the fault is
    /// not retryable at all. Returns `Some(())` when the fault was retryable,
    /// whether or not attempts remain.
    async fn on_fault(
        &self,
        policy: &RetryPolicy,
        attempt: u32,
        fault: &TransportFault,
    ) -> Option<()> {
        let cause = RetryCause::Fault(fault.kind);
        if !policy.is_retryable(cause) {
            error!(error = %fault, "Non-retryable client error");
            return None;
        }
        if let RetryDecision::Retry(delay) = policy.next_delay(attempt, cause) {
            warn!(
                error = %fault,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retryable error, backing off"
            );
            tokio::time::sleep(delay).await;
        }
        Some(())
    }
}

/// Maps a terminal transport fault to the public taxonomy.
pub(crate) fn fault_error(fault: &TransportFault) -> FetchError {
    if fault.kind.is_retryable() {
        FetchError::TransientNetwork(fault.message.clone())
    } else {
        FetchError::Client(fault.message.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
