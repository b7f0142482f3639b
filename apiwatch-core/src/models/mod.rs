//! Domain models for apiwatch.
//!
//! ## Submodules
//!
//! - [`revision`] - Stored revisions and content kinds
//! - [`change`] - Structural change sets and severity
//! - [`decision`] - Per-URL decision outcomes
//! - [`fetch`] - Fetch routing strategy
//! - [`notification`] - Messages for notification channels and analyzers

mod change;
mod decision;
mod fetch;
mod notification;
mod revision;

// Re-export everything at the models level
pub use change::{
    ChangeCategories, ChangeSet, DiffEntry, DiffKind, DocPath, PathSegment, Severity,
};
pub use decision::{Decision, DecisionOutcome};
pub use fetch::FetchStrategyKind;
pub use notification::{
    ChangeNotification, DigestEntry, DocLocation, DocumentationUpdate, TextAnalysis,
};
pub use revision::{ContentKind, NewRevision, Revision};

#[cfg(test)]
mod serde_tests;
