//! The change detector.
//!
//! Given the stored revision and freshly fetched content, decides whether
//! anything changed, persists the new revision and notifies.

use apiwatch_core::{
    AiAnalyzer, ChangeNotification, ChangeSet, ContentKind, DecisionOutcome, NewRevision,
    Repository, Revision, Severity, TextAnalysis, TextExtractor,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::comparator::{compare_api_spec, compare_opaque_text, compare_structured, fingerprint};
use crate::error::DetectError;
use crate::notify::NotifierManager;
use crate::text::{truncate_head_tail, HtmlTextExtractor, DEFAULT_MAX_HTML_CHARS};

/// Summary recorded for changes the analyzer dismissed.
pub const INSIGNIFICANT_SUMMARY: &str = "Insignificant changes";

/// Summary for moderate or major API-spec changes without an analyzer.
pub const API_SPEC_SUMMARY: &str = "OpenAPI specification changes detected";

/// API name used in notifications when none is configured.
pub const UNKNOWN_API: &str = "Unknown API";

/// The document a decision is about.
#[derive(Debug, Clone, Copy)]
struct Subject<'a> {
    url: &'a str,
    api_name: Option<&'a str>,
    method_name: Option<&'a str>,
}

impl Subject<'_> {
    fn revision(
        &self,
        content: &str,
        kind: ContentKind,
        extracted_text: String,
        structured_data: Option<Value>,
    ) -> NewRevision {
        NewRevision {
            url: self.url.to_string(),
            raw_content: content.to_string(),
            extracted_text,
            content_kind: kind,
            content_hash: fingerprint(content),
            has_changes: false,
            summary: None,
            structured_data,
            api_name: self.api_name.map(str::to_string),
            method_name: self.method_name.map(str::to_string),
        }
    }

    fn notification(&self, summary: &str, severity: Severity, key_changes: Vec<String>) -> ChangeNotification {
        ChangeNotification {
            api_name: self.api_name.unwrap_or(UNKNOWN_API).to_string(),
            method_name: self.method_name.map(str::to_string),
            url: self.url.to_string(),
            summary: summary.to_string(),
            severity,
            key_changes,
        }
    }
}

/// Parses a structured document: JSON first, then YAML.
pub fn parse_document(text: &str) -> Result<Value, DetectError> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str::<Value>(text).map_err(|yaml_err| {
            DetectError::Parse(format!("not JSON ({json_err}) nor YAML ({yaml_err})"))
        }),
    }
}

/// Compares new content against the stored revision and acts on the result.
pub struct ChangeDetector {
    repository: Arc<dyn Repository>,
    notifiers: Arc<NotifierManager>,
    analyzer: Option<Arc<dyn AiAnalyzer>>,
    extractor: Arc<dyn TextExtractor>,
    max_html_chars: usize,
}

impl ChangeDetector {
    /// Creates a detector with the regex text extractor and no analyzer.
    pub fn new(repository: Arc<dyn Repository>, notifiers: Arc<NotifierManager>) -> Self {
        Self {
            repository,
            notifiers,
            analyzer: None,
            extractor: Arc::new(HtmlTextExtractor),
            max_html_chars: DEFAULT_MAX_HTML_CHARS,
        }
    }

    /// Uses `analyzer` to judge text changes and summarize spec changes.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn AiAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Replaces the text extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Sets the ceiling on HTML converted to text.
    #[must_use]
    pub fn with_max_html_chars(mut self, max_html_chars: usize) -> Self {
        self.max_html_chars = max_html_chars.max(1);
        self
    }

    /// Normalized text of `html`, truncated head and tail when oversized.
    pub fn html_to_text(&self, html: &str) -> String {
        self.extractor
            .extract(&truncate_head_tail(html, self.max_html_chars))
    }

    /// Stores the first revision of a URL. Nothing is notified.
    #[instrument(skip_all, fields(url = %url, kind = %kind))]
    pub async fn record_first_snapshot(
        &self,
        content: &str,
        kind: ContentKind,
        url: &str,
        api_name: Option<&str>,
        method_name: Option<&str>,
    ) -> DecisionOutcome {
        let subject = Subject {
            url,
            api_name,
            method_name,
        };

        let revision = match kind {
            ContentKind::Html => subject.revision(content, kind, self.html_to_text(content), None),
            ContentKind::Json | ContentKind::ApiSpec => match parse_document(content) {
                Ok(doc) => subject.revision(content, kind, pretty(&doc, content), Some(doc)),
                Err(e) => {
                    debug!(error = %e, "Storing unparsed baseline");
                    subject.revision(content, kind, content.to_string(), None)
                }
            },
        };

        if let Err(e) = self.repository.save(revision).await {
            warn!(error = %e, "Failed to save first snapshot");
            return DecisionOutcome::failed(url, format!("Failed to save revision: {e}"));
        }

        info!("First snapshot stored");
        DecisionOutcome::first_snapshot(url)
    }

    /// Decides whether `new_content` differs from `old`.
    ///
    /// Reportable changes are persisted and then notified. Parse and storage
    /// failures yield a failed outcome with nothing persisted or notified.
    #[instrument(skip_all, fields(url = %url, kind = %kind))]
    pub async fn detect(
        &self,
        old: &Revision,
        new_content: &str,
        kind: ContentKind,
        url: &str,
        api_name: Option<&str>,
        method_name: Option<&str>,
    ) -> DecisionOutcome {
        let subject = Subject {
            url,
            api_name,
            method_name,
        };

        let result = if old.content_kind == kind {
            match kind {
                ContentKind::Html => self.detect_html(old, new_content, subject).await,
                ContentKind::Json => self.detect_json(old, new_content, subject).await,
                ContentKind::ApiSpec => self.detect_api_spec(old, new_content, subject).await,
            }
        } else {
            self.record_kind_change(old.content_kind, new_content, kind, subject)
                .await
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Change detection failed");
            DecisionOutcome::failed(url, e.to_string())
        })
    }

    async fn persist(&self, revision: NewRevision) -> Result<(), DetectError> {
        self.repository.save(revision).await.map_err(DetectError::from)
    }

    async fn detect_html(
        &self,
        old: &Revision,
        new_content: &str,
        subject: Subject<'_>,
    ) -> Result<DecisionOutcome, DetectError> {
        if old.content_hash == fingerprint(new_content) {
            debug!("Content hash unchanged");
            return Ok(DecisionOutcome::unchanged(subject.url));
        }

        let old_text = if old.raw_content.is_empty() {
            old.extracted_text.clone()
        } else {
            self.html_to_text(&old.raw_content)
        };
        let new_text = self.html_to_text(new_content);

        if !compare_opaque_text(&old_text, &new_text) {
            debug!("Markup changed, text did not");
            return Ok(DecisionOutcome::unchanged(subject.url));
        }

        let analysis = match &self.analyzer {
            Some(analyzer) => analyzer
                .analyze_text_change(&old_text, &new_text, subject.api_name, subject.method_name)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Analyzer failed, treating change as significant");
                    TextAnalysis::assume_significant()
                }),
            None => TextAnalysis::assume_significant(),
        };

        let mut revision = subject.revision(new_content, ContentKind::Html, new_text, None);

        if !analysis.significant {
            revision.summary = Some(INSIGNIFICANT_SUMMARY.to_string());
            self.persist(revision).await?;
            info!("Change judged insignificant");
            return Ok(DecisionOutcome::insignificant(subject.url));
        }

        revision.has_changes = true;
        revision.summary = Some(analysis.summary.clone());
        self.persist(revision).await?;

        let notification = subject.notification(
            &analysis.summary,
            analysis.severity,
            analysis.key_changes.clone(),
        );
        self.notifiers.send_change(&notification).await;

        info!(severity = %analysis.severity, "Page changed");
        Ok(
            DecisionOutcome::changed(subject.url, analysis.summary, analysis.severity)
                .with_key_changes(analysis.key_changes),
        )
    }

    async fn detect_json(
        &self,
        old: &Revision,
        new_content: &str,
        subject: Subject<'_>,
    ) -> Result<DecisionOutcome, DetectError> {
        let old_doc = stored_document(old, |raw| Ok(serde_json::from_str(raw)?))?;
        let new_doc: Value = serde_json::from_str(new_content)
            .map_err(|e| DetectError::Parse(format!("invalid JSON: {e}")))?;

        let change_set = compare_structured(&old_doc, &new_doc, &[]);
        if !change_set.has_changes {
            return Ok(DecisionOutcome::unchanged(subject.url));
        }

        let summary = format!("JSON changes: {} items", change_set.len());
        let severity = Severity::Moderate;

        let mut revision = subject.revision(
            new_content,
            ContentKind::Json,
            pretty(&new_doc, new_content),
            Some(new_doc),
        );
        revision.has_changes = true;
        revision.summary = Some(summary.clone());
        self.persist(revision).await?;

        self.notifiers
            .send_change(&subject.notification(&summary, severity, Vec::new()))
            .await;

        info!(entries = change_set.len(), "JSON document changed");
        Ok(DecisionOutcome::changed(subject.url, summary, severity).with_change_set(change_set))
    }

    async fn detect_api_spec(
        &self,
        old: &Revision,
        new_content: &str,
        subject: Subject<'_>,
    ) -> Result<DecisionOutcome, DetectError> {
        let old_doc = require_mapping(stored_document(old, parse_document)?)?;
        let new_doc = require_mapping(parse_document(new_content)?)?;

        let change_set = compare_api_spec(&old_doc, &new_doc);
        if !change_set.has_changes {
            debug!("API spec unchanged outside ignored paths");
            return Ok(DecisionOutcome::unchanged(subject.url));
        }

        let severity = change_set.severity;
        let summary = self.api_spec_summary(&change_set, subject.api_name).await;
        let key_changes = change_set.categorized.breaking_changes.clone();

        let mut revision = subject.revision(
            new_content,
            ContentKind::ApiSpec,
            pretty(&new_doc, new_content),
            Some(new_doc),
        );
        revision.has_changes = true;
        revision.summary = Some(summary.clone());
        self.persist(revision).await?;

        self.notifiers
            .send_change(&subject.notification(&summary, severity, key_changes.clone()))
            .await;

        info!(
            severity = %severity,
            new_endpoints = change_set.categorized.new_endpoints.len(),
            removed_endpoints = change_set.categorized.removed_endpoints.len(),
            breaking = key_changes.len(),
            "API spec changed"
        );
        Ok(DecisionOutcome::changed(subject.url, summary, severity)
            .with_key_changes(key_changes)
            .with_change_set(change_set))
    }

    async fn api_spec_summary(&self, change_set: &ChangeSet, api_name: Option<&str>) -> String {
        if change_set.severity < Severity::Moderate {
            return format!("Minor changes ({} items)", change_set.len());
        }

        let Some(analyzer) = &self.analyzer else {
            return API_SPEC_SUMMARY.to_string();
        };

        match analyzer.analyze_structured_change(change_set, api_name).await {
            Ok(summary) if !summary.trim().is_empty() => summary,
            Ok(_) => API_SPEC_SUMMARY.to_string(),
            Err(e) => {
                warn!(error = %e, "Analyzer failed, using default summary");
                API_SPEC_SUMMARY.to_string()
            }
        }
    }

    /// The document changed shape (say an HTML page became a JSON endpoint).
    /// There is nothing to diff, so the new content becomes the baseline and
    /// the switch is reported.
    async fn record_kind_change(
        &self,
        old_kind: ContentKind,
        new_content: &str,
        kind: ContentKind,
        subject: Subject<'_>,
    ) -> Result<DecisionOutcome, DetectError> {
        let summary = format!("Content type changed from {old_kind} to {kind}");
        let severity = Severity::Moderate;

        let mut revision = match kind {
            ContentKind::Html => {
                subject.revision(new_content, kind, self.html_to_text(new_content), None)
            }
            ContentKind::Json | ContentKind::ApiSpec => {
                let doc = parse_document(new_content)?;
                subject.revision(new_content, kind, pretty(&doc, new_content), Some(doc))
            }
        };
        revision.has_changes = true;
        revision.summary = Some(summary.clone());
        self.persist(revision).await?;

        self.notifiers
            .send_change(&subject.notification(&summary, severity, Vec::new()))
            .await;

        info!(from = %old_kind, to = %kind, "Content type changed");
        Ok(DecisionOutcome::changed(subject.url, summary, severity))
    }
}

/// The stored document, preferring the parsed copy over the raw content.
fn stored_document(
    old: &Revision,
    parse: impl Fn(&str) -> Result<Value, DetectError>,
) -> Result<Value, DetectError> {
    match &old.structured_data {
        Some(doc) => Ok(doc.clone()),
        None => parse(&old.raw_content)
            .map_err(|e| DetectError::Parse(format!("stored revision: {e}"))),
    }
}

fn require_mapping(doc: Value) -> Result<Value, DetectError> {
    if doc.is_object() {
        Ok(doc)
    } else {
        Err(DetectError::Parse("API spec is not a mapping".to_string()))
    }
}

fn pretty(doc: &Value, fallback: &str) -> String {
    serde_json::to_string_pretty(doc).unwrap_or_else(|_| fallback.to_string())
}
