// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # apiwatch Detect
//!
//! Change detection for watched documentation.
//!
//! ## Modules
//!
//! - [`comparator`] - Fingerprints, structural diff and API-spec categories
//! - [`text`] - HTML to normalized text
//! - [`content`] - Response validation and content kind detection
//! - [`detector`] - Per-URL decision: compare, persist, notify
//! - [`notify`] - Fan-out to registered notifiers
//! - [`watcher`] - Cycle processing with a concurrency gate
//!
//! ## Example
//!
//! ```ignore
//! use apiwatch_detect::{load_targets, NotifierManager, Watcher, WatcherConfig};
//!
//! let watcher = Watcher::new(fetcher, repository, Arc::new(NotifierManager::default()), WatcherConfig::default());
//! let targets = load_targets(Path::new("targets.json")).await?;
//! let report = watcher.run_cycle(&targets).await;
//! println!("{} changed", report.summary.changed);
//! ```

pub mod comparator;
pub mod content;
pub mod detector;
pub mod error;
pub mod notify;
pub mod text;
pub mod watcher;

pub use comparator::{
    api_spec_exclusions, compare_api_spec, compare_opaque_text, compare_structured, fingerprint,
};
pub use content::{ContentProcessor, DEFAULT_MAX_JSON_PARSE_CHARS};
pub use detector::{parse_document, ChangeDetector, UNKNOWN_API};
pub use error::DetectError;
pub use notify::{LogNotifier, NotifierManager};
pub use text::{truncate_head_tail, HtmlTextExtractor, DEFAULT_MAX_HTML_CHARS};
pub use watcher::{
    load_targets, parse_targets, CycleReport, CycleSummary, WatchTarget, Watcher, WatcherConfig,
    DEFAULT_MAX_CONCURRENT, DEFAULT_STAGGER,
};
