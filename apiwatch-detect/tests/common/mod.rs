//! Test doubles shared by the detection integration tests.

#![allow(dead_code)]

use apiwatch_core::{
    AiAnalyzer, ChangeNotification, ChangeSet, CoreError, DigestEntry, DocLocation, DocsLocator,
    DocumentationUpdate, NewRevision, Notifier, Repository, Revision, Severity, TextAnalysis,
};
use apiwatch_fetch::{ContentSource, FetchOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Repository
// ============================================================================

#[derive(Default)]
pub struct MemoryRepository {
    revisions: Mutex<Vec<Revision>>,
    pub fail_saves: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn saved(&self) -> Vec<Revision> {
        self.revisions.lock().unwrap().clone()
    }

    pub fn insert(&self, revision: Revision) {
        self.revisions.lock().unwrap().push(revision);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn latest(&self, url: &str) -> Result<Option<Revision>, CoreError> {
        Ok(self
            .revisions
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.url == url)
            .cloned())
    }

    async fn save(&self, revision: NewRevision) -> Result<(), CoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CoreError::Storage("disk full".into()));
        }
        self.revisions.lock().unwrap().push(revision.into_revision());
        Ok(())
    }

    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Revision>, CoreError> {
        let mut changed: Vec<Revision> = self
            .revisions
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.has_changes && r.created_at >= since)
            .cloned()
            .collect();
        changed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(changed)
    }
}

// ============================================================================
// Notifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub changes: Mutex<Vec<ChangeNotification>>,
    pub digests: Mutex<Vec<Vec<DigestEntry>>>,
    pub doc_updates: Mutex<Vec<DocumentationUpdate>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn changes(&self) -> Vec<ChangeNotification> {
        self.changes.lock().unwrap().clone()
    }

    pub fn doc_updates(&self) -> Vec<DocumentationUpdate> {
        self.doc_updates.lock().unwrap().clone()
    }

    pub fn digests(&self) -> Vec<Vec<DigestEntry>> {
        self.digests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_change(&self, notification: &ChangeNotification) -> Result<(), CoreError> {
        self.changes.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn send_digest(&self, entries: &[DigestEntry]) -> Result<(), CoreError> {
        self.digests.lock().unwrap().push(entries.to_vec());
        Ok(())
    }

    async fn send_doc_update(&self, update: &DocumentationUpdate) -> Result<(), CoreError> {
        self.doc_updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

// ============================================================================
// Analyzer
// ============================================================================

pub enum AnalyzerReply {
    Text(TextAnalysis),
    Summary(String),
    Fail,
}

pub struct FakeAnalyzer {
    reply: AnalyzerReply,
    pub calls: AtomicUsize,
}

impl FakeAnalyzer {
    pub fn new(reply: AnalyzerReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn insignificant() -> Arc<Self> {
        Self::new(AnalyzerReply::Text(TextAnalysis {
            significant: false,
            summary: "Only a footer year changed".into(),
            severity: Severity::Minor,
            key_changes: Vec::new(),
        }))
    }
}

#[async_trait]
impl AiAnalyzer for FakeAnalyzer {
    async fn analyze_text_change(
        &self,
        _old_text: &str,
        _new_text: &str,
        _api_name: Option<&str>,
        _method_name: Option<&str>,
    ) -> Result<TextAnalysis, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            AnalyzerReply::Text(analysis) => Ok(analysis.clone()),
            AnalyzerReply::Summary(_) | AnalyzerReply::Fail => {
                Err(CoreError::Analysis("model unavailable".into()))
            }
        }
    }

    async fn analyze_structured_change(
        &self,
        _change_set: &ChangeSet,
        _api_name: Option<&str>,
    ) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            AnalyzerReply::Summary(summary) => Ok(summary.clone()),
            AnalyzerReply::Text(_) | AnalyzerReply::Fail => {
                Err(CoreError::Analysis("model unavailable".into()))
            }
        }
    }
}

// ============================================================================
// Content Source
// ============================================================================

/// Serves canned outcomes by URL and counts upstream calls.
#[derive(Default)]
pub struct FakeSource {
    pages: Mutex<HashMap<String, (u16, String)>>,
    pub requested: Mutex<Vec<String>>,
    pub delay: Option<Duration>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn serve(&self, url: &str, status: u16, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_string()));
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let page = self.pages.lock().unwrap().get(url).cloned();
        match page {
            Some((status, body)) => FetchOutcome::completed(url, status, body, 1),
            None => FetchOutcome::failure(
                url,
                0,
                apiwatch_fetch::FetchError::TransientNetwork("connection refused".into()),
                1,
            ),
        }
    }
}

// ============================================================================
// Locator
// ============================================================================

pub struct FakeLocator {
    pub replacement: Option<DocLocation>,
    pub calls: AtomicUsize,
}

impl FakeLocator {
    pub fn pointing_to(url: &str) -> Arc<Self> {
        Arc::new(Self {
            replacement: Some(DocLocation {
                url: url.to_string(),
                doc_type: "html".into(),
                title: Some("Pets API".into()),
            }),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DocsLocator for FakeLocator {
    async fn find_replacement(
        &self,
        _url: &str,
        _api_name: Option<&str>,
        _method_name: Option<&str>,
    ) -> Result<Option<DocLocation>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.replacement.clone())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// An HTML page long enough to pass validation.
pub fn docs_page(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Pets API</title></head><body>\
         <nav>Home | Reference | Changelog</nav><main>{body}</main>\
         <footer>Copyright Example Inc. All rights reserved.</footer></body></html>"
    )
}
