//! Change-set types produced by the structural comparator.
//!
//! - [`Severity`] - How serious a change is
//! - [`DiffKind`] / [`DiffEntry`] - One raw structural difference
//! - [`ChangeCategories`] - API-spec buckets
//! - [`ChangeSet`] - Everything one comparison produced

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Severity
// ============================================================================

/// Severity of a detected change.
///
/// Ordered so `Minor < Moderate < Major`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or low-impact change.
    #[default]
    Minor,
    /// Notable change, such as a new or removed endpoint.
    Moderate,
    /// Breaking change.
    Major,
}

impl Severity {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
        }
    }

    /// Parses a severity name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minor" | "low" => Some(Self::Minor),
            "moderate" | "medium" => Some(Self::Moderate),
            "major" | "high" | "critical" => Some(Self::Major),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Diff Entries
// ============================================================================

/// Kind of a single structural difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// A key exists only in the new document.
    ItemAdded,
    /// A key exists only in the old document.
    ItemRemoved,
    /// A scalar changed value, same type.
    ValueChanged,
    /// A value changed JSON type.
    TypeChanged,
    /// An array gained an element.
    IterableItemAdded,
    /// An array lost an element.
    IterableItemRemoved,
}

impl DiffKind {
    /// Returns true for additions.
    pub fn is_addition(&self) -> bool {
        matches!(self, Self::ItemAdded | Self::IterableItemAdded)
    }

    /// Returns true for removals.
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::ItemRemoved | Self::IterableItemRemoved)
    }
}

/// One segment of a document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

/// A location inside a document, rendered as `root['a']['b'][0]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DocPath(pub Vec<PathSegment>);

impl DocPath {
    /// The document root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a child path with `key` appended.
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    /// Returns a child path with `index` appended.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Returns the segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns the key at `position`, if that segment is a key.
    pub fn key_at(&self, position: usize) -> Option<&str> {
        match self.0.get(position) {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Returns the number of segments.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns true if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &DocPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Parses `root['a']['b'][0]` notation.
    ///
    /// Keys may be single- or double-quoted. Returns `None` for anything that
    /// does not start with `root` or has an unterminated bracket.
    pub fn parse(text: &str) -> Option<Self> {
        let mut rest = text.trim().strip_prefix("root")?;
        let mut segments = Vec::new();

        while !rest.is_empty() {
            rest = rest.strip_prefix('[')?;
            if let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
                let body = &rest[1..];
                let end = body.find(quote)?;
                segments.push(PathSegment::Key(body[..end].to_string()));
                rest = body[end + 1..].strip_prefix(']')?;
            } else {
                let end = rest.find(']')?;
                let index = rest[..end].trim().parse().ok()?;
                segments.push(PathSegment::Index(index));
                rest = &rest[end + 1..];
            }
        }

        Some(Self(segments))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("root")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(k) => write!(f, "['{k}']")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

/// A single structural difference between two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// What kind of difference.
    pub kind: DiffKind,
    /// Where in the document.
    pub path: DocPath,
    /// Old value, absent for additions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
    /// New value, absent for removals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
}

// ============================================================================
// Categories & Change Set
// ============================================================================

/// API-spec buckets, each holding rendered paths or descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeCategories {
    /// Endpoints that appeared.
    pub new_endpoints: Vec<String>,
    /// Endpoints that disappeared.
    pub removed_endpoints: Vec<String>,
    /// Changes inside existing endpoints.
    pub modified_endpoints: Vec<String>,
    /// Reusable schema definitions added or removed.
    pub schema_changes: Vec<String>,
    /// Changes that can break existing clients.
    pub breaking_changes: Vec<String>,
}

impl ChangeCategories {
    /// Returns true if every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.new_endpoints.is_empty()
            && self.removed_endpoints.is_empty()
            && self.modified_endpoints.is_empty()
            && self.schema_changes.is_empty()
            && self.breaking_changes.is_empty()
    }

    /// Severity implied by the buckets.
    pub fn severity(&self) -> Severity {
        if !self.breaking_changes.is_empty() {
            Severity::Major
        } else if !self.new_endpoints.is_empty() || !self.removed_endpoints.is_empty() {
            Severity::Moderate
        } else {
            Severity::Minor
        }
    }
}

/// The result of comparing two documents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Whether any difference was found.
    pub has_changes: bool,
    /// Raw differences, in document order.
    pub entries: Vec<DiffEntry>,
    /// API-spec buckets (empty for generic JSON).
    pub categorized: ChangeCategories,
    /// Severity of the change.
    pub severity: Severity,
}

impl ChangeSet {
    /// A change set with no differences.
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Builds a change set from raw entries, without categorization.
    pub fn from_entries(entries: Vec<DiffEntry>) -> Self {
        Self {
            has_changes: !entries.is_empty(),
            entries,
            categorized: ChangeCategories::default(),
            severity: Severity::Minor,
        }
    }

    /// Number of raw differences.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
