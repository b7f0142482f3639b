//! Content fetching facade.
//!
//! Picks the direct or proxy path per URL. Static assets (spec files, raw
//! repository content) never need rendering, so they always go direct and
//! never spend proxy quota.

pub use apiwatch_core::FetchStrategyKind;

use apiwatch_core::QuotaLedger;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::direct::{DirectConfig, DirectFetcher};
use crate::error::FetchError;
use crate::outcome::FetchOutcome;
use crate::proxy::{ProxyConfig, ProxyFetcher, ProxyStats};
use crate::urls::{looks_static, DEFAULT_RAW_HOSTS};

// ============================================================================
// Content Source
// ============================================================================

/// Anything that turns a URL into a [`FetchOutcome`].
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches `url`.
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

// ============================================================================
// Content Fetcher
// ============================================================================

/// Routing settings for [`ContentFetcher`].
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Which path goes first.
    pub strategy: FetchStrategyKind,
    /// Send static assets direct even when the proxy would be chosen.
    pub skip_static: bool,
    /// Hosts that serve raw file content.
    pub raw_hosts: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: FetchStrategyKind::DirectFirst,
            skip_static: true,
            raw_hosts: DEFAULT_RAW_HOSTS.iter().map(|h| (*h).to_string()).collect(),
        }
    }
}

/// Fetch statistics for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Active strategy.
    pub strategy: FetchStrategyKind,
    /// True if a proxy key is configured.
    pub proxy_configured: bool,
    /// Proxy state, when configured.
    pub proxy: Option<ProxyStats>,
}

/// Routes each URL to the direct or proxy fetcher.
pub struct ContentFetcher {
    direct: DirectFetcher,
    proxy: Option<ProxyFetcher>,
    routing: RoutingConfig,
}

impl ContentFetcher {
    /// Creates a fetcher from ready-made parts.
    pub fn new(direct: DirectFetcher, proxy: Option<ProxyFetcher>, routing: RoutingConfig) -> Self {
        Self {
            direct,
            proxy,
            routing,
        }
    }

    /// Builds both fetchers from configuration. The proxy is only created
    /// when an API key is set.
    pub fn from_config(
        direct: &DirectConfig,
        proxy: ProxyConfig,
        quota: Arc<dyn QuotaLedger>,
        routing: RoutingConfig,
    ) -> Result<Self, FetchError> {
        let direct = DirectFetcher::new(direct)?;
        let proxy = if proxy.is_configured() {
            Some(ProxyFetcher::new(proxy, quota)?)
        } else {
            debug!("No proxy API key, proxy disabled");
            None
        };
        Ok(Self::new(direct, proxy, routing))
    }

    /// Returns the proxy fetcher, if configured.
    pub fn proxy(&self) -> Option<&ProxyFetcher> {
        self.proxy.as_ref()
    }

    /// Returns true if `url` skips the proxy.
    pub fn is_static(&self, url: &str) -> bool {
        self.routing.skip_static && looks_static(url, &self.routing.raw_hosts)
    }

    /// Fetches `url` along the configured route.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let is_static = self.is_static(url);
        let proxy = self.proxy.as_ref().filter(|_| !is_static);

        match (self.routing.strategy, proxy) {
            (FetchStrategyKind::ProxyOnly, Some(proxy)) => proxy.fetch_with_fallback(url).await,
            (FetchStrategyKind::ProxyOnly, None) | (FetchStrategyKind::DirectFirst, None) => {
                self.direct.fetch(url, true).await
            }
            (FetchStrategyKind::DirectFirst, Some(proxy)) => {
                let direct = self.direct.fetch(url, true).await;
                if direct.success_content().is_some_and(|c| !c.is_empty()) {
                    return direct;
                }
                if !proxy.can_use_quota().await {
                    debug!("Proxy unavailable, keeping direct result");
                    return direct;
                }
                info!(reason = %direct.failure_reason(), "Direct fetch failed, falling back to proxy");
                proxy.fetch_with_fallback(url).await
            }
        }
    }

    /// Returns the body of a successful fetch, if any.
    pub async fn fetch_content(&self, url: &str) -> Option<String> {
        self.fetch(url).await.into_content()
    }

    /// Current statistics.
    pub async fn stats(&self) -> FetchStats {
        let proxy = match &self.proxy {
            Some(proxy) => Some(proxy.stats().await),
            None => None,
        };
        FetchStats {
            strategy: self.routing.strategy,
            proxy_configured: self.proxy.is_some(),
            proxy,
        }
    }
}

#[async_trait]
impl ContentSource for ContentFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        ContentFetcher::fetch(self, url).await
    }
}

// ============================================================================
// Tests
// ============================================================================
