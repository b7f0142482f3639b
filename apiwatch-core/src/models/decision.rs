//! Per-URL decision types.

use serde::{Deserialize, Serialize};

use super::change::{ChangeSet, Severity};

/// What the detection engine decided for one URL this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// No prior revision existed; the content was stored as a baseline.
    FirstSnapshot,
    /// Content is unchanged.
    Unchanged,
    /// Content changed but the analyzer judged it insignificant.
    Insignificant,
    /// A reportable change was persisted and notified.
    Changed,
    /// Fetching, validation or comparison failed for this URL.
    Failed(String),
}

/// The outcome of processing one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    /// URL that was processed (the replacement URL after rediscovery).
    pub url: String,
    /// The decision.
    pub decision: Decision,
    /// Summary of the change, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Severity of the change, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Highlighted changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_changes: Vec<String>,
    /// Structural change set for JSON and API-spec documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_set: Option<ChangeSet>,
}

impl DecisionOutcome {
    fn with(url: impl Into<String>, decision: Decision) -> Self {
        Self {
            url: url.into(),
            decision,
            summary: None,
            severity: None,
            key_changes: Vec::new(),
            change_set: None,
        }
    }

    /// Baseline stored.
    pub fn first_snapshot(url: impl Into<String>) -> Self {
        Self::with(url, Decision::FirstSnapshot)
    }

    /// Nothing changed.
    pub fn unchanged(url: impl Into<String>) -> Self {
        Self::with(url, Decision::Unchanged)
    }

    /// Changed, but not worth reporting.
    pub fn insignificant(url: impl Into<String>) -> Self {
        Self::with(url, Decision::Insignificant)
    }

    /// Reportable change.
    pub fn changed(url: impl Into<String>, summary: impl Into<String>, severity: Severity) -> Self {
        let mut outcome = Self::with(url, Decision::Changed);
        outcome.summary = Some(summary.into());
        outcome.severity = Some(severity);
        outcome
    }

    /// Processing failed for this URL.
    pub fn failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with(url, Decision::Failed(reason.into()))
    }

    /// Attaches highlighted changes.
    pub fn with_key_changes(mut self, key_changes: Vec<String>) -> Self {
        self.key_changes = key_changes;
        self
    }

    /// Attaches the structural change set.
    pub fn with_change_set(mut self, change_set: ChangeSet) -> Self {
        self.change_set = Some(change_set);
        self
    }

    /// Returns true if a reportable change was detected.
    pub fn has_changes(&self) -> bool {
        self.decision == Decision::Changed
    }

    /// Returns true if processing failed.
    pub fn is_failure(&self) -> bool {
        matches!(self.decision, Decision::Failed(_))
    }

    /// Returns the failure reason, if any.
    pub fn error(&self) -> Option<&str> {
        match &self.decision {
            Decision::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
