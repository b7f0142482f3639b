//! Stored document revisions.
//!
//! - [`ContentKind`] - Shape of a fetched document
//! - [`Revision`] - A persisted revision as the repository hands it back
//! - [`NewRevision`] - A revision the detection engine asks to persist

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Content Kind
// ============================================================================

/// The shape of a fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// HTML page (or any text without structure).
    #[default]
    Html,
    /// Generic JSON document.
    Json,
    /// OpenAPI / Swagger document, JSON or YAML encoded.
    #[serde(alias = "openapi")]
    ApiSpec,
}

impl ContentKind {
    /// Returns the stable identifier stored alongside revisions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Json => "json",
            Self::ApiSpec => "openapi",
        }
    }

    /// Returns true for kinds compared structurally.
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Json | Self::ApiSpec)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Revision
// ============================================================================

/// A persisted document revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// URL the content was fetched from.
    pub url: String,
    /// Raw fetched content.
    pub raw_content: String,
    /// Normalized text extracted from the raw content.
    #[serde(default)]
    pub extracted_text: String,
    /// Document shape.
    #[serde(default)]
    pub content_kind: ContentKind,
    /// SHA-256 fingerprint of the raw content.
    pub content_hash: String,
    /// Parsed document for structured kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<serde_json::Value>,
    /// API this document belongs to.
    #[serde(default)]
    pub api_name: Option<String>,
    /// Method or page within the API.
    #[serde(default)]
    pub method_name: Option<String>,
    /// Whether this revision was recorded as a change.
    #[serde(default)]
    pub has_changes: bool,
    /// Summary attached when the revision was saved.
    #[serde(default)]
    pub summary: Option<String>,
    /// When the revision was saved.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// New Revision
// ============================================================================

/// A revision the detection engine asks the repository to save.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRevision {
    /// URL the content was fetched from.
    pub url: String,
    /// Raw fetched content.
    pub raw_content: String,
    /// Normalized text.
    pub extracted_text: String,
    /// Document shape.
    pub content_kind: ContentKind,
    /// SHA-256 fingerprint of the raw content.
    pub content_hash: String,
    /// Whether this revision is recorded as a change.
    pub has_changes: bool,
    /// Optional summary.
    pub summary: Option<String>,
    /// Parsed document for structured kinds.
    pub structured_data: Option<serde_json::Value>,
    /// API this document belongs to.
    pub api_name: Option<String>,
    /// Method or page within the API.
    pub method_name: Option<String>,
}

impl NewRevision {
    /// Converts into a stored revision stamped with the current time.
    pub fn into_revision(self) -> Revision {
        self.into_revision_at(Utc::now())
    }

    /// Converts into a stored revision stamped with `created_at`.
    pub fn into_revision_at(self, created_at: DateTime<Utc>) -> Revision {
        Revision {
            url: self.url,
            raw_content: self.raw_content,
            extracted_text: self.extracted_text,
            content_kind: self.content_kind,
            content_hash: self.content_hash,
            structured_data: self.structured_data,
            api_name: self.api_name,
            method_name: self.method_name,
            has_changes: self.has_changes,
            summary: self.summary,
            created_at,
        }
    }
}
