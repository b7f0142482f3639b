// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # apiwatch Store
//!
//! Everything `apiwatch` keeps on disk.
//!
//! This crate provides:
//!
//! - **QuotaTracker**: Durable day-scoped counter for the paid proxy
//! - **JsonRevisionRepository**: Bounded per-URL revision history
//! - **ProcessLock**: Single-instance lock file
//! - **Config**: JSON configuration with environment overrides
//! - **Persistence**: Atomic JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use apiwatch_store::{Config, QuotaTracker, quota_path};
//!
//! let config = Config::load()?;
//! let quota = QuotaTracker::with_local_date(quota_path(&config.data_dir()));
//!
//! if quota.try_increment("zenrows", config.proxy.daily_limit, 1).await {
//!     // spend one proxy call
//! }
//! ```

pub mod config;
pub mod error;
pub mod lock;
pub mod persistence;
pub mod quota;
pub mod repository;

pub use config::{Config, FetchConfig, GeneralConfig, ProxyConfig, WatchConfig};
pub use error::StoreError;
pub use lock::ProcessLock;
pub use persistence::{
    default_config_dir, default_config_path, default_data_dir, ensure_dir, history_dir,
    load_json, load_json_or_default, lock_path, quota_path, save_json,
};
pub use quota::{QuotaSnapshot, QuotaTracker};
pub use repository::{JsonRevisionRepository, DEFAULT_HISTORY_LIMIT};

#[cfg(test)]
mod persistence_tests;
