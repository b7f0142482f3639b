//! Configuration management.
//!
//! A single JSON file; every field has a default, so an empty object (or no
//! file at all) is a valid configuration. Secrets can come from the
//! environment instead of the file.

use apiwatch_core::FetchStrategyKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_config_path, default_data_dir};

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "APIWATCH_CONFIG";

/// Environment variable carrying the proxy API key.
pub const ENV_PROXY_API_KEY: &str = "APIWATCH_PROXY_API_KEY";

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "APIWATCH_DATA_DIR";

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Direct fetching and routing.
    pub fetch: FetchConfig,
    /// Paid proxy.
    pub proxy: ProxyConfig,
    /// Watch cycle.
    pub watch: WatchConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Where quota, history and the lock file live.
    pub data_dir: Option<PathBuf>,
    /// JSON file listing watch targets.
    pub targets_file: Option<PathBuf>,
    /// Take the single-instance lock before running.
    pub use_lock_file: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: None,
            targets_file: None,
            use_lock_file: true,
        }
    }
}

/// Direct fetching and routing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total request timeout in seconds.
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// User agent header.
    pub user_agent: Option<String>,
    /// Total attempts per direct fetch.
    pub max_retries: u32,
    /// Delay after the first failure, in seconds.
    pub retry_delay_secs: f64,
    /// Delay growth factor.
    pub retry_multiplier: f64,
    /// Body ceiling in bytes.
    pub max_response_bytes: u64,
    /// Which path a URL takes first.
    pub strategy: FetchStrategyKind,
    /// Keep static assets off the proxy.
    pub skip_static_for_proxy: bool,
    /// Hosts serving raw file content.
    pub raw_hosts: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: None,
            max_retries: 3,
            retry_delay_secs: 1.0,
            retry_multiplier: 2.0,
            max_response_bytes: 2 * 1024 * 1024,
            strategy: FetchStrategyKind::DirectFirst,
            skip_static_for_proxy: true,
            raw_hosts: vec![
                "raw.githubusercontent.com".to_string(),
                "gist.githubusercontent.com".to_string(),
            ],
        }
    }
}

/// Paid proxy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// API key; the proxy is off without one.
    pub api_key: Option<String>,
    /// Endpoint URL.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Total attempts per logical request.
    pub max_retries: u32,
    /// Delay after the first failure, in seconds.
    pub retry_delay_secs: f64,
    /// Requests per day; negative is unlimited, zero disables.
    pub daily_limit: i64,
    /// Render JavaScript.
    pub js_render: bool,
    /// Anti-bot bypass.
    pub antibot: bool,
    /// Failures that block a domain for the day.
    pub max_domain_failures: u32,
    /// Failures in a row that disable the proxy for the day.
    pub max_consecutive_errors: u32,
    /// Quota ledger key.
    pub service_name: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.zenrows.com/v1/".to_string(),
            timeout_secs: 60,
            max_retries: 1,
            retry_delay_secs: 2.0,
            daily_limit: 2000,
            js_render: true,
            antibot: false,
            max_domain_failures: 3,
            max_consecutive_errors: 10,
            service_name: "zenrows".to_string(),
        }
    }
}

impl ProxyConfig {
    /// The API key, if set and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Watch cycle settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// URLs processed at once.
    pub max_concurrent: usize,
    /// Start offset unit in seconds; target `i` waits `stagger * (i % max_concurrent)`.
    pub stagger_secs: f64,
    /// Daemon interval in seconds.
    pub check_interval_secs: u64,
    /// Smallest daemon interval allowed while a proxy is configured.
    pub min_check_interval_secs: u64,
    /// Allow intervals below the minimum.
    pub allow_fast_poll: bool,
    /// HTML text above this many characters is truncated head and tail.
    pub max_html_chars: usize,
    /// Bodies above this many characters skip JSON validation.
    pub max_json_parse_chars: usize,
    /// Revisions kept per URL.
    pub history_limit: usize,
    /// Days covered by the digest.
    pub digest_days: i64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            stagger_secs: 0.2,
            check_interval_secs: 3600,
            min_check_interval_secs: 3600,
            allow_fast_poll: false,
            max_html_chars: 500_000,
            max_json_parse_chars: 2 * 1024 * 1024,
            history_limit: 20,
            digest_days: 7,
        }
    }
}

impl Config {
    /// Returns the configuration file path: `APIWATCH_CONFIG`, else the
    /// platform default.
    pub fn default_path() -> PathBuf {
        std::env::var_os(ENV_CONFIG_PATH).map_or_else(default_config_path, PathBuf::from)
    }

    /// Loads configuration from the default path and applies the environment.
    pub fn load() -> Result<Self, StoreError> {
        let mut config = Self::load_from(&Self::default_path())?;
        config.apply_env();
        Ok(config)
    }

    /// Loads configuration from a specific path. A missing file yields
    /// defaults.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_PROXY_API_KEY).filter(|k| !k.trim().is_empty()) {
            debug!("Proxy API key taken from environment");
            self.proxy.api_key = Some(key);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            self.general.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), StoreError> {
        let level = self.general.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(StoreError::Config(format!(
                "unknown log level '{}'",
                self.general.log_level
            )));
        }
        if self.fetch.timeout_secs == 0 || self.proxy.timeout_secs == 0 {
            return Err(StoreError::Config("timeouts must be positive".to_string()));
        }
        if self.fetch.retry_delay_secs < 0.0 || self.proxy.retry_delay_secs < 0.0 {
            return Err(StoreError::Config("retry delays must not be negative".to_string()));
        }
        if self.watch.max_concurrent == 0 {
            return Err(StoreError::Config("watch.max_concurrent must be at least 1".to_string()));
        }
        if self.watch.stagger_secs < 0.0 {
            return Err(StoreError::Config("watch.stagger_secs must not be negative".to_string()));
        }
        if self.proxy.api_key().is_some() && !self.proxy.endpoint.starts_with("http") {
            return Err(StoreError::Config(format!(
                "proxy endpoint '{}' is not an http(s) URL",
                self.proxy.endpoint
            )));
        }
        Ok(())
    }

    /// The data directory, resolved against the platform default.
    pub fn data_dir(&self) -> PathBuf {
        self.general.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// The daemon interval after the fast-poll guard.
    ///
    /// With a proxy configured and fast polling not allowed, intervals
    /// below the minimum are raised to it.
    pub fn effective_check_interval(&self) -> u64 {
        let requested = self.watch.check_interval_secs;
        if self.proxy.api_key().is_some()
            && !self.watch.allow_fast_poll
            && requested < self.watch.min_check_interval_secs
        {
            self.watch.min_check_interval_secs
        } else {
            requested.max(1)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
