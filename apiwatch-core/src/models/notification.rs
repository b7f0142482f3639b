//! Messages handed to notification channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::change::Severity;

/// A detected change, ready to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// API name, `Unknown API` when not configured.
    pub api_name: String,
    /// Method or page within the API.
    pub method_name: Option<String>,
    /// Document URL.
    pub url: String,
    /// Human-readable summary.
    pub summary: String,
    /// Severity of the change.
    pub severity: Severity,
    /// Highlighted changes.
    #[serde(default)]
    pub key_changes: Vec<String>,
}

/// One line of the periodic digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    /// API name.
    pub api_name: Option<String>,
    /// Method or page within the API.
    pub method_name: Option<String>,
    /// Document URL.
    pub url: String,
    /// Summary recorded with the change.
    pub summary: String,
    /// When the change was recorded.
    pub created_at: DateTime<Utc>,
}

/// A documentation URL was replaced after the old one stopped serving content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationUpdate {
    /// API name.
    pub api_name: String,
    /// Method or page within the API.
    pub method_name: Option<String>,
    /// URL that stopped working.
    pub old_url: String,
    /// URL found instead.
    pub new_url: String,
    /// Kind of documentation found (e.g. `openapi`, `html`).
    pub doc_type: String,
    /// Page title, if known.
    pub title: Option<String>,
}

/// What the AI analyzer said about a text change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnalysis {
    /// Whether the change is worth reporting.
    pub significant: bool,
    /// Prose summary.
    pub summary: String,
    /// Severity judgement.
    pub severity: Severity,
    /// Highlighted changes.
    #[serde(default)]
    pub key_changes: Vec<String>,
}

impl TextAnalysis {
    /// The judgement used when no analyzer is configured.
    pub fn assume_significant() -> Self {
        Self {
            significant: true,
            summary: "Changes detected".to_string(),
            severity: Severity::Moderate,
            key_changes: Vec::new(),
        }
    }
}

/// A located replacement for a broken documentation URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocLocation {
    /// Replacement URL.
    pub url: String,
    /// Kind of documentation found.
    pub doc_type: String,
    /// Page title, if known.
    pub title: Option<String>,
}
