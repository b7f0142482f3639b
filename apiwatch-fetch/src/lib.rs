// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # apiwatch Fetch
//!
//! Resilient fetching of remote documentation pages.
//!
//! ## Layers
//!
//! - [`transport`] - The [`Transport`] seam over `reqwest`
//! - [`body`] - Size-bounded body reading and charset decoding
//! - [`retry`] - Pure exponential backoff policy
//! - [`direct`] - Retrying direct HTTP fetcher
//! - [`circuit`] - Day-scoped circuit breaker for the paid proxy
//! - [`proxy`] - Proxy fetcher guarded by the circuit and the daily quota
//! - [`content`] - Facade routing each URL direct or through the proxy
//! - [`coalesce`] - Per-cycle deduplication of in-flight requests
//!
//! ## Example
//!
//! ```ignore
//! use apiwatch_fetch::{ContentFetcher, DirectConfig, ProxyConfig, RoutingConfig};
//!
//! let fetcher = ContentFetcher::from_config(
//!     &DirectConfig::default(),
//!     ProxyConfig::default(),
//!     quota_tracker,
//!     RoutingConfig::default(),
//! )?;
//!
//! if let Some(html) = fetcher.fetch_content("https://docs.example.com/api").await {
//!     println!("{} bytes", html.len());
//! }
//! ```

pub mod body;
pub mod circuit;
pub mod coalesce;
pub mod content;
pub mod direct;
pub mod error;
pub mod outcome;
pub mod proxy;
pub mod retry;
pub mod transport;
pub mod urls;

// Errors
pub use error::{DisableReason, FaultKind, FetchError, TransportFault};

// Building blocks
pub use body::{BodyError, BoundedBodyReader, DEFAULT_MAX_RESPONSE_BYTES};
pub use circuit::{CircuitConfig, CircuitState};
pub use outcome::FetchOutcome;
pub use retry::{RetryCause, RetryDecision, RetryPolicy};
pub use transport::{HttpTransport, RawResponse, Transport, TransportRequest, TransportSettings};

// Fetchers
pub use coalesce::FetchCoalescer;
pub use content::{ContentFetcher, ContentSource, FetchStats, FetchStrategyKind, RoutingConfig};
pub use direct::{DirectConfig, DirectFetcher};
pub use proxy::{ProxyConfig, ProxyFeatures, ProxyFetcher, ProxyStats, QuotaMode};
