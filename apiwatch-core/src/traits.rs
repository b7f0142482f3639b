//! Trait definitions for apiwatch.
//!
//! The detection engine and the fetch layer reach every external
//! collaborator through one of these traits: revision storage, notification
//! channels, the optional AI analyzer, text extraction, documentation
//! rediscovery and the paid-service quota ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::models::{
    ChangeNotification, ChangeSet, DigestEntry, DocLocation, DocumentationUpdate, NewRevision,
    Revision, TextAnalysis,
};

/// Revision storage.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Returns the most recent revision for `url`.
    async fn latest(&self, url: &str) -> Result<Option<Revision>, CoreError>;

    /// Persists a new revision.
    async fn save(&self, revision: NewRevision) -> Result<(), CoreError>;

    /// Returns revisions flagged as changes since `since`, newest first.
    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Revision>, CoreError>;
}

/// A notification channel (chat, webhook, console, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Reports one detected change.
    async fn send_change(&self, notification: &ChangeNotification) -> Result<(), CoreError>;

    /// Sends the periodic digest of recorded changes.
    async fn send_digest(&self, entries: &[DigestEntry]) -> Result<(), CoreError>;

    /// Reports a documentation URL replacement.
    async fn send_doc_update(&self, update: &DocumentationUpdate) -> Result<(), CoreError>;
}

/// Optional LLM-backed change analyzer.
#[async_trait]
pub trait AiAnalyzer: Send + Sync {
    /// Judges a change between two normalized texts.
    async fn analyze_text_change(
        &self,
        old_text: &str,
        new_text: &str,
        api_name: Option<&str>,
        method_name: Option<&str>,
    ) -> Result<TextAnalysis, CoreError>;

    /// Writes a prose summary of a structural change set.
    async fn analyze_structured_change(
        &self,
        change_set: &ChangeSet,
        api_name: Option<&str>,
    ) -> Result<String, CoreError>;
}

/// Converts markup into normalized text for comparison.
pub trait TextExtractor: Send + Sync {
    /// Returns normalized text for `html`.
    fn extract(&self, html: &str) -> String;
}

/// Finds a replacement for a documentation URL that stopped serving content.
#[async_trait]
pub trait DocsLocator: Send + Sync {
    /// Searches for a replacement location.
    async fn find_replacement(
        &self,
        url: &str,
        api_name: Option<&str>,
        method_name: Option<&str>,
    ) -> Result<Option<DocLocation>, CoreError>;
}

/// Day-scoped usage counter for a paid service.
///
/// `limit < 0` means unlimited, `limit == 0` means the service is disabled.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Today's count for `service`.
    async fn usage(&self, service: &str) -> u64;

    /// Atomically checks the limit and adds `count`. Returns false, without
    /// mutating, if the new total would exceed `limit`.
    async fn try_increment(&self, service: &str, limit: i64, count: u64) -> bool;

    /// Read-only projection of [`QuotaLedger::try_increment`] for one more call.
    async fn can_use(&self, service: &str, limit: i64) -> bool;
}
