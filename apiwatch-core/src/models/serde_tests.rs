//! Serde serialization/deserialization tests for core types.
//!
//! Revisions are persisted by the file-backed repository and decisions are
//! printed as JSON by the CLI, so their wire shapes must stay stable.

use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::{
    ChangeSet, ContentKind, Decision, DecisionOutcome, DiffEntry, DiffKind, DocPath,
    FetchStrategyKind, NewRevision, Revision, Severity,
};

// ============================================================================
// ContentKind Serde Tests
// ============================================================================

#[test]
fn test_content_kind_serialized_names() {
    assert_eq!(serde_json::to_string(&ContentKind::Html).unwrap(), r#""html""#);
    assert_eq!(serde_json::to_string(&ContentKind::ApiSpec).unwrap(), r#""api_spec""#);
}

#[test]
fn test_content_kind_accepts_openapi_alias() {
    let kind: ContentKind = serde_json::from_str(r#""openapi""#).unwrap();
    assert_eq!(kind, ContentKind::ApiSpec);
}

// ============================================================================
// Revision Serde Tests
// ============================================================================

#[test]
fn test_revision_defaults_for_missing_fields() {
    let value = json!({
        "url": "https://example.com/docs",
        "raw_content": "<html></html>",
        "content_hash": "abc",
        "created_at": "2026-01-02T03:04:05Z"
    });

    let revision: Revision = serde_json::from_value(value).unwrap();
    assert_eq!(revision.content_kind, ContentKind::Html);
    assert!(revision.structured_data.is_none());
    assert!(!revision.has_changes);
    assert_eq!(revision.extracted_text, "");
}

#[test]
fn test_new_revision_keeps_fields() {
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let revision = NewRevision {
        url: "https://example.com/openapi.json".into(),
        raw_content: "{}".into(),
        extracted_text: "{}".into(),
        content_kind: ContentKind::ApiSpec,
        content_hash: "hash".into(),
        has_changes: true,
        summary: Some("summary".into()),
        structured_data: Some(json!({})),
        api_name: Some("Pets".into()),
        method_name: None,
    }
    .into_revision_at(at);

    assert_eq!(revision.created_at, at);
    assert_eq!(revision.api_name.as_deref(), Some("Pets"));

    let json = serde_json::to_string(&revision).unwrap();
    let parsed: Revision = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, revision);
}

// ============================================================================
// Decision Serde Tests
// ============================================================================

#[test]
fn test_decision_outcome_skips_empty_fields() {
    let outcome = DecisionOutcome::unchanged("https://example.com");
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value, json!({"url": "https://example.com", "decision": "unchanged"}));
}

#[test]
fn test_failed_decision_carries_reason() {
    let outcome = DecisionOutcome::failed("https://example.com", "Failed to fetch");
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["decision"], json!({"failed": "Failed to fetch"}));
    assert_eq!(outcome.error(), Some("Failed to fetch"));
    assert!(!outcome.has_changes());
}

#[test]
fn test_changed_decision_serializes_change_set() {
    let entry = DiffEntry {
        kind: DiffKind::ItemRemoved,
        path: DocPath::root().key("paths").key("/pets"),
        old_value: Some(json!({})),
        new_value: None,
    };
    let outcome = DecisionOutcome::changed("u", "removed", Severity::Major)
        .with_change_set(ChangeSet::from_entries(vec![entry]));

    let json = serde_json::to_string(&outcome).unwrap();
    let parsed: DecisionOutcome = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.decision, Decision::Changed);
    assert_eq!(parsed.severity, Some(Severity::Major));
    assert_eq!(parsed.change_set.unwrap().len(), 1);
}

#[test]
fn test_fetch_strategy_kebab_case() {
    assert_eq!(
        serde_json::to_string(&FetchStrategyKind::ProxyOnly).unwrap(),
        r#""proxy-only""#
    );
    let parsed: FetchStrategyKind = serde_json::from_str(r#""direct-first""#).unwrap();
    assert_eq!(parsed, FetchStrategyKind::DirectFirst);
    assert!(serde_json::from_str::<FetchStrategyKind>(r#""proxy-first""#).is_err());
}
