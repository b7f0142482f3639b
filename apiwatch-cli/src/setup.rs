//! Wiring from the configuration file to the runtime components.

use anyhow::{Context, Result};
use apiwatch_detect::{NotifierManager, Watcher, WatcherConfig};
use apiwatch_fetch::{
    CircuitConfig, ContentFetcher, DirectConfig, FetchStrategyKind, ProxyConfig, RoutingConfig,
    TransportSettings,
};
use apiwatch_store::{history_dir, quota_path, Config, JsonRevisionRepository, QuotaTracker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Loads the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load_from(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            config.apply_env();
            config
        }
        None => Config::load().context("failed to load configuration")?,
    };
    Ok(config)
}

/// Direct fetcher settings.
pub fn direct_config(config: &Config) -> DirectConfig {
    let fetch = &config.fetch;
    let mut transport = TransportSettings {
        timeout: Duration::from_secs(fetch.timeout_secs),
        connect_timeout: Duration::from_secs(fetch.connect_timeout_secs),
        ..TransportSettings::default()
    };
    if let Some(agent) = fetch.user_agent.as_deref().filter(|a| !a.trim().is_empty()) {
        transport.user_agent = agent.to_string();
    }

    DirectConfig {
        transport,
        max_retries: fetch.max_retries,
        retry_delay: secs(fetch.retry_delay_secs),
        retry_multiplier: fetch.retry_multiplier,
        max_response_bytes: fetch.max_response_bytes,
    }
}

/// Proxy fetcher settings. The key is empty when none is configured.
pub fn proxy_config(config: &Config) -> ProxyConfig {
    let proxy = &config.proxy;
    ProxyConfig {
        api_key: proxy.api_key().unwrap_or_default().to_string(),
        endpoint: proxy.endpoint.clone(),
        timeout: Duration::from_secs(proxy.timeout_secs),
        max_retries: proxy.max_retries,
        retry_delay: secs(proxy.retry_delay_secs),
        daily_limit: proxy.daily_limit,
        js_render: proxy.js_render,
        antibot: proxy.antibot,
        max_response_bytes: config.fetch.max_response_bytes,
        circuit: CircuitConfig {
            max_domain_failures: proxy.max_domain_failures,
            max_consecutive_errors: proxy.max_consecutive_errors,
        },
        service_name: proxy.service_name.clone(),
    }
}

/// Routing settings.
pub fn routing_config(config: &Config) -> RoutingConfig {
    RoutingConfig {
        strategy: config.fetch.strategy,
        skip_static: config.fetch.skip_static_for_proxy,
        raw_hosts: config.fetch.raw_hosts.clone(),
    }
}

/// Watcher settings.
pub fn watcher_config(config: &Config) -> WatcherConfig {
    let watch = &config.watch;
    WatcherConfig {
        max_concurrent: watch.max_concurrent.max(1),
        stagger: secs(watch.stagger_secs),
        max_html_chars: watch.max_html_chars,
        max_json_parse_chars: watch.max_json_parse_chars,
    }
}

/// The quota ledger under the data directory.
pub fn quota_tracker(config: &Config) -> Arc<QuotaTracker> {
    let path = quota_path(&config.data_dir());
    debug!(path = %path.display(), "Using quota file");
    Arc::new(QuotaTracker::with_local_date(path))
}

/// Builds the content fetcher.
pub fn build_fetcher(config: &Config, quota: Arc<QuotaTracker>) -> Result<Arc<ContentFetcher>> {
    let fetcher = ContentFetcher::from_config(
        &direct_config(config),
        proxy_config(config),
        quota,
        routing_config(config),
    )
    .context("failed to build HTTP client")?;
    Ok(Arc::new(fetcher))
}

/// Builds the watcher over `fetcher`, storing history under the data dir.
pub fn build_watcher(config: &Config, fetcher: Arc<ContentFetcher>) -> Watcher {
    let repository = Arc::new(JsonRevisionRepository::new(
        history_dir(&config.data_dir()),
        config.watch.history_limit,
    ));
    Watcher::new(
        fetcher,
        repository,
        Arc::new(NotifierManager::default()),
        watcher_config(config),
    )
}
