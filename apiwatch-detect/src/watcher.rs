//! The watch loop: fetch, validate, rediscover, detect.

use apiwatch_core::{
    AiAnalyzer, DecisionOutcome, DigestEntry, DocsLocator, DocumentationUpdate, Repository,
    TextExtractor,
};
use apiwatch_fetch::{ContentSource, FetchCoalescer};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::content::{ContentProcessor, DEFAULT_MAX_JSON_PARSE_CHARS};
use crate::detector::ChangeDetector;
use crate::error::DetectError;
use crate::notify::NotifierManager;
use crate::text::DEFAULT_MAX_HTML_CHARS;

/// Default number of URLs processed at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Default spacing between task starts.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(200);

/// Digest summary for changes saved without one.
const DEFAULT_DIGEST_SUMMARY: &str = "Changes detected";

// ============================================================================
// Targets
// ============================================================================

/// One documentation URL to watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    /// Document URL.
    pub url: String,
    /// API the document belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,
    /// Method or page within the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
}

impl WatchTarget {
    /// A target with no names attached.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_name: None,
            method_name: None,
        }
    }
}

#[derive(Deserialize)]
struct TargetEntry {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    api_name: Option<String>,
    #[serde(default)]
    method_name: Option<String>,
}

/// Parses a targets document: a JSON array of `{url, api_name?, method_name?}`.
///
/// Entries without a URL are skipped.
pub fn parse_targets(json: &str) -> Result<Vec<WatchTarget>, DetectError> {
    let entries: Vec<TargetEntry> =
        serde_json::from_str(json).map_err(|e| DetectError::InvalidTargets(e.to_string()))?;

    let total = entries.len();
    let targets: Vec<WatchTarget> = entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.url.filter(|u| !u.trim().is_empty())?;
            Some(WatchTarget {
                url,
                api_name: entry.api_name,
                method_name: entry.method_name,
            })
        })
        .collect();

    if targets.len() < total {
        warn!(skipped = total - targets.len(), "Skipping targets without a URL");
    }
    Ok(targets)
}

/// Loads watch targets from a JSON file.
pub async fn load_targets(path: &Path) -> Result<Vec<WatchTarget>, DetectError> {
    let json = tokio::fs::read_to_string(path).await?;
    let targets = parse_targets(&json)?;
    debug!(path = %path.display(), count = targets.len(), "Loaded watch targets");
    Ok(targets)
}

// ============================================================================
// Configuration
// ============================================================================

/// Watcher tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherConfig {
    /// URLs processed at once.
    pub max_concurrent: usize,
    /// Task `i` waits `stagger * (i % max_concurrent)` before starting.
    pub stagger: Duration,
    /// Ceiling on HTML converted to text.
    pub max_html_chars: usize,
    /// Ceiling on bodies parsed as JSON.
    pub max_json_parse_chars: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            stagger: DEFAULT_STAGGER,
            max_html_chars: DEFAULT_MAX_HTML_CHARS,
            max_json_parse_chars: DEFAULT_MAX_JSON_PARSE_CHARS,
        }
    }
}

// ============================================================================
// Cycle Report
// ============================================================================

/// Counts for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Targets processed.
    pub total: usize,
    /// Targets with a reportable change.
    pub changed: usize,
    /// Targets that failed.
    pub failed: usize,
}

impl CycleSummary {
    /// Tallies `outcomes`.
    pub fn from_outcomes(outcomes: &[DecisionOutcome]) -> Self {
        Self {
            total: outcomes.len(),
            changed: outcomes.iter().filter(|o| o.has_changes()).count(),
            failed: outcomes.iter().filter(|o| o.is_failure()).count(),
        }
    }
}

/// Everything one cycle produced, in target order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// One outcome per target.
    pub outcomes: Vec<DecisionOutcome>,
    /// Counts.
    pub summary: CycleSummary,
}

// ============================================================================
// Watcher
// ============================================================================

/// Why fetched content was not used.
enum Rejection {
    /// Nothing usable came back from the fetch layer.
    Unavailable(String),
    /// A body arrived but failed validation.
    Invalid(String),
}

impl Rejection {
    fn reason(&self) -> &str {
        match self {
            Self::Unavailable(reason) | Self::Invalid(reason) => reason,
        }
    }
}

/// Processes watch targets end to end.
pub struct Watcher {
    coalescer: FetchCoalescer,
    processor: ContentProcessor,
    detector: ChangeDetector,
    repository: Arc<dyn Repository>,
    notifiers: Arc<NotifierManager>,
    locator: Option<Arc<dyn DocsLocator>>,
    config: WatcherConfig,
}

impl Watcher {
    /// Creates a watcher fetching through `source`.
    pub fn new(
        source: Arc<dyn ContentSource>,
        repository: Arc<dyn Repository>,
        notifiers: Arc<NotifierManager>,
        config: WatcherConfig,
    ) -> Self {
        let detector = ChangeDetector::new(Arc::clone(&repository), Arc::clone(&notifiers))
            .with_max_html_chars(config.max_html_chars);
        Self {
            coalescer: FetchCoalescer::new(source),
            processor: ContentProcessor::new(config.max_json_parse_chars),
            detector,
            repository,
            notifiers,
            locator: None,
            config,
        }
    }

    /// Uses `locator` to find replacements for broken documentation URLs.
    #[must_use]
    pub fn with_locator(mut self, locator: Arc<dyn DocsLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Uses `analyzer` in the change detector.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn AiAnalyzer>) -> Self {
        self.detector = self.detector.with_analyzer(analyzer);
        self
    }

    /// Replaces the detector's text extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.detector = self.detector.with_extractor(extractor);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Returns the per-cycle fetch coalescer.
    pub fn coalescer(&self) -> &FetchCoalescer {
        &self.coalescer
    }

    /// Fetches `url` and returns its content if it is usable documentation.
    async fn fetch_valid(&self, url: &str) -> Result<String, Rejection> {
        let outcome = self.coalescer.fetch(url).await;
        let status = outcome.status_code;
        let Some(content) = outcome.content.clone() else {
            return Err(Rejection::Unavailable(outcome.failure_reason()));
        };
        self.processor
            .validate(url, &content, status)
            .map(|()| content)
            .map_err(|e| Rejection::Invalid(e.to_string()))
    }

    /// Asks the locator for a replacement of `url` and fetches it.
    async fn rediscover(
        &self,
        url: &str,
        api_name: Option<&str>,
        method_name: Option<&str>,
    ) -> Result<(String, String), String> {
        let Some(locator) = &self.locator else {
            return Err("No alternative found".to_string());
        };

        let location = match locator.find_replacement(url, api_name, method_name).await {
            Ok(Some(location)) => location,
            Ok(None) => return Err("No alternative found".to_string()),
            Err(e) => {
                warn!(error = %e, "Documentation search failed");
                return Err(format!("Documentation search failed: {e}"));
            }
        };

        info!(new_url = %location.url, doc_type = %location.doc_type, "Found replacement documentation");
        let update = DocumentationUpdate {
            api_name: api_name.unwrap_or("Unknown").to_string(),
            method_name: method_name.map(str::to_string),
            old_url: url.to_string(),
            new_url: location.url.clone(),
            doc_type: location.doc_type.clone(),
            title: location.title.clone(),
        };
        self.notifiers.send_doc_update(&update).await;

        match self.fetch_valid(&location.url).await {
            Ok(content) => Ok((location.url, content)),
            Err(rejection) => Err(format!("New URL also failed: {}", rejection.reason())),
        }
    }

    /// Processes one URL: fetch, validate (rediscovering on invalid
    /// content), then store a baseline or detect changes.
    ///
    /// The returned outcome names the URL actually compared, which is the
    /// replacement URL after a successful rediscovery.
    #[instrument(skip(self), fields(api = api_name.unwrap_or("-")))]
    pub async fn process_url(
        &self,
        url: &str,
        api_name: Option<&str>,
        method_name: Option<&str>,
    ) -> DecisionOutcome {
        let (url, content) = match self.fetch_valid(url).await {
            Ok(content) => (url.to_string(), content),
            Err(Rejection::Unavailable(reason)) => {
                warn!(reason = %reason, "Fetch failed");
                return DecisionOutcome::failed(url, format!("Failed to fetch: {reason}"));
            }
            Err(Rejection::Invalid(reason)) => {
                debug!(reason = %reason, "Trying to rediscover documentation");
                match self.rediscover(url, api_name, method_name).await {
                    Ok(found) => found,
                    Err(rediscovery) => {
                        return DecisionOutcome::failed(url, format!("{reason}; {rediscovery}"));
                    }
                }
            }
        };

        let kind = self.processor.detect_kind(&url, &content);
        debug!(kind = %kind, bytes = content.len(), "Content fetched");

        match self.repository.latest(&url).await {
            Ok(None) => {
                self.detector
                    .record_first_snapshot(&content, kind, &url, api_name, method_name)
                    .await
            }
            Ok(Some(old)) => {
                self.detector
                    .detect(&old, &content, kind, &url, api_name, method_name)
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Failed to load latest revision");
                DecisionOutcome::failed(url, format!("Failed to load latest revision: {e}"))
            }
        }
    }

    /// Runs one cycle over `targets`.
    ///
    /// Clears the fetch coalescer first. At most `max_concurrent` targets are
    /// processed at once; outcomes come back in target order.
    pub async fn run_cycle(&self, targets: &[WatchTarget]) -> CycleReport {
        self.coalescer.begin_cycle().await;

        let max_concurrent = self.config.max_concurrent.max(1);
        let gate = Semaphore::new(max_concurrent);
        info!(targets = targets.len(), max_concurrent, "Starting cycle");

        let tasks = targets.iter().enumerate().map(|(index, target)| {
            let gate = &gate;
            async move {
                let slot = u32::try_from(index % max_concurrent).unwrap_or(0);
                if slot > 0 && !self.config.stagger.is_zero() {
                    tokio::time::sleep(self.config.stagger.saturating_mul(slot)).await;
                }

                let Ok(_permit) = gate.acquire().await else {
                    return DecisionOutcome::failed(&target.url, "Concurrency gate closed");
                };
                self.process_url(
                    &target.url,
                    target.api_name.as_deref(),
                    target.method_name.as_deref(),
                )
                .await
            }
        });

        let outcomes = futures::future::join_all(tasks).await;
        let summary = CycleSummary::from_outcomes(&outcomes);
        info!(
            total = summary.total,
            changed = summary.changed,
            failed = summary.failed,
            "Cycle complete"
        );

        CycleReport { outcomes, summary }
    }

    /// Sends a digest of the changes recorded in the last `days` days.
    ///
    /// Returns the number of digest entries.
    pub async fn send_digest(&self, days: u32) -> Result<usize, DetectError> {
        let since = Utc::now() - chrono::Duration::days(i64::from(days));
        let revisions = self.repository.changed_since(since).await?;

        let entries: Vec<DigestEntry> = revisions
            .into_iter()
            .map(|r| DigestEntry {
                api_name: r.api_name,
                method_name: r.method_name,
                url: r.url,
                summary: r.summary.unwrap_or_else(|| DEFAULT_DIGEST_SUMMARY.to_string()),
                created_at: r.created_at,
            })
            .collect();

        info!(days, changes = entries.len(), "Sending digest");
        self.notifiers.send_digest(&entries).await;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets_skips_entries_without_url() {
        let json = r#"[
            {"url": "https://a.example/docs", "api_name": "A"},
            {"api_name": "missing"},
            {"url": "  "},
            {"url": "https://b.example/openapi.json", "method_name": "spec"}
        ]"#;

        let targets = parse_targets(json).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].api_name.as_deref(), Some("A"));
        assert_eq!(targets[1].method_name.as_deref(), Some("spec"));
    }

    #[test]
    fn test_parse_targets_rejects_non_array() {
        assert!(matches!(
            parse_targets(r#"{"url": "https://a"}"#),
            Err(DetectError::InvalidTargets(_))
        ));
    }

    #[test]
    fn test_cycle_summary_counts() {
        let outcomes = vec![
            DecisionOutcome::changed("a", "s", apiwatch_core::Severity::Minor),
            DecisionOutcome::unchanged("b"),
            DecisionOutcome::failed("c", "x"),
            DecisionOutcome::first_snapshot("d"),
        ];
        assert_eq!(
            CycleSummary::from_outcomes(&outcomes),
            CycleSummary {
                total: 4,
                changed: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_load_targets_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("targets.json");
        tokio::fs::write(&path, r#"[{"url": "https://a.example/docs"}]"#)
            .await
            .unwrap();

        let targets = load_targets(&path).await.unwrap();
        assert_eq!(targets, vec![WatchTarget::new("https://a.example/docs")]);
    }
}
