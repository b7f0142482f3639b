// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `apiwatch` Core
//!
//! Core types, models, and collaborator traits for `apiwatch`.
//!
//! This crate provides the foundational abstractions shared by the fetch
//! layer, the store and the detection engine:
//!
//! - Domain models (revisions, change sets, decisions, notifications)
//! - Error types
//! - Trait definitions for external collaborators
//! - Calendar date sources for day-scoped windows
//!
//! ## Key Types
//!
//! ### Revisions
//! - [`ContentKind`] - HTML, JSON or API-spec document
//! - [`Revision`] / [`NewRevision`] - Stored and to-be-stored revisions
//!
//! ### Changes
//! - [`ChangeSet`] - Structural differences with categories and severity
//! - [`DiffEntry`] / [`DocPath`] - One raw difference and where it is
//! - [`Severity`] - minor, moderate or major
//! - [`DecisionOutcome`] - What happened to one URL this cycle
//! - [`FetchStrategyKind`] - direct-first or proxy-only routing
//!
//! ### Collaborators
//! - [`Repository`], [`Notifier`], [`AiAnalyzer`], [`TextExtractor`],
//!   [`DocsLocator`], [`QuotaLedger`]

pub mod clock;
pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Changes
    ChangeCategories,
    ChangeSet,
    DiffEntry,
    DiffKind,
    DocPath,
    PathSegment,
    Severity,
    // Decisions
    Decision,
    DecisionOutcome,
    // Fetch routing
    FetchStrategyKind,
    // Notifications
    ChangeNotification,
    DigestEntry,
    DocLocation,
    DocumentationUpdate,
    TextAnalysis,
    // Revisions
    ContentKind,
    NewRevision,
    Revision,
};

pub use clock::{local_date_source, DateSource, ManualDate};

// Re-export traits
pub use traits::{AiAnalyzer, DocsLocator, Notifier, QuotaLedger, Repository, TextExtractor};
