//! Persistence and history edge case tests.
//!
//! Tests file I/O operations, JSON persistence, and the revision history
//! files.

use apiwatch_core::{ContentKind, NewRevision, Repository};
use chrono::{Duration, Utc};
use std::path::PathBuf;
use tempfile::TempDir;

use crate::config::Config;
use crate::persistence::{ensure_dir, load_json, load_json_or_default, save_json};
use crate::repository::JsonRevisionRepository;

fn revision(url: &str, content: &str, has_changes: bool) -> NewRevision {
    NewRevision {
        url: url.to_string(),
        raw_content: content.to_string(),
        extracted_text: content.to_string(),
        content_kind: ContentKind::Html,
        content_hash: format!("hash-{content}"),
        has_changes,
        summary: has_changes.then(|| "Changes detected".to_string()),
        structured_data: None,
        api_name: Some("Example".to_string()),
        method_name: None,
    }
}

// ============================================================================
// JSON Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested_path = temp_dir.path().join("deeply").join("nested").join("test.json");

    let data = serde_json::json!({"key": "value"});

    save_json(&nested_path, &data).await.unwrap();
    assert!(nested_path.exists());
}

#[tokio::test]
async fn test_load_nonexistent_file() {
    let file_path = PathBuf::from("/nonexistent/path/config.json");

    let result: Result<Config, _> = load_json(&file_path).await;
    assert!(result.is_err());

    let fallback: Config = load_json_or_default(&file_path).await;
    assert_eq!(fallback, Config::default());
}

#[tokio::test]
async fn test_ensure_dir_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir_path = temp_dir.path().join("test_dir");

    ensure_dir(&dir_path).await.unwrap();
    ensure_dir(&dir_path).await.unwrap();

    assert!(dir_path.is_dir());
}

#[tokio::test]
async fn test_atomic_write_leaves_no_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("atomic.json");

    save_json(&file_path, &Config::default()).await.unwrap();
    save_json(&file_path, &Config::default()).await.unwrap();

    let names: Vec<String> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["atomic.json".to_string()]);
}

#[tokio::test]
async fn test_load_json_with_unknown_fields() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("extra_fields.json");

    let json = r#"{
        "watch": {"max_concurrent": 4, "unknown": true},
        "nested_unknown": {"key": "value"}
    }"#;
    tokio::fs::write(&file_path, json).await.unwrap();

    let loaded: Config = load_json(&file_path).await.unwrap();
    assert_eq!(loaded.watch.max_concurrent, 4);
}

// ============================================================================
// Revision History Tests
// ============================================================================

#[tokio::test]
async fn test_latest_returns_newest_revision() {
    let temp_dir = TempDir::new().unwrap();
    let repo = JsonRevisionRepository::new(temp_dir.path(), 20);

    assert!(repo.latest("https://a.example/docs").await.unwrap().is_none());

    repo.save(revision("https://a.example/docs", "v1", false)).await.unwrap();
    repo.save(revision("https://a.example/docs", "v2", true)).await.unwrap();

    let latest = repo.latest("https://a.example/docs").await.unwrap().unwrap();
    assert_eq!(latest.raw_content, "v2");
    assert!(latest.has_changes);
    assert_eq!(latest.api_name.as_deref(), Some("Example"));
}

#[tokio::test]
async fn test_urls_get_separate_files() {
    let temp_dir = TempDir::new().unwrap();
    let repo = JsonRevisionRepository::new(temp_dir.path(), 20);

    repo.save(revision("https://a.example/docs", "a", false)).await.unwrap();
    repo.save(revision("https://b.example/docs", "b", false)).await.unwrap();

    assert_ne!(
        repo.file_for("https://a.example/docs"),
        repo.file_for("https://b.example/docs")
    );
    assert_eq!(
        repo.latest("https://b.example/docs").await.unwrap().unwrap().raw_content,
        "b"
    );
}

#[tokio::test]
async fn test_history_is_bounded() {
    let temp_dir = TempDir::new().unwrap();
    let repo = JsonRevisionRepository::new(temp_dir.path(), 3);

    for i in 0..5 {
        repo.save(revision("https://a.example/docs", &format!("v{i}"), false))
            .await
            .unwrap();
    }

    let history = repo.history("https://a.example/docs").await;
    let contents: Vec<&str> = history.iter().map(|r| r.raw_content.as_str()).collect();
    assert_eq!(contents, vec!["v2", "v3", "v4"]);
}

#[tokio::test]
async fn test_changed_since_filters_unchanged_and_old() {
    let temp_dir = TempDir::new().unwrap();
    let repo = JsonRevisionRepository::new(temp_dir.path(), 20);

    repo.save(revision("https://a.example/docs", "first", false)).await.unwrap();
    repo.save(revision("https://a.example/docs", "second", true)).await.unwrap();
    repo.save(revision("https://b.example/docs", "other", true)).await.unwrap();

    let recent = repo.changed_since(Utc::now() - Duration::hours(1)).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|r| r.has_changes));

    let future = repo.changed_since(Utc::now() + Duration::hours(1)).await.unwrap();
    assert!(future.is_empty());
}

#[tokio::test]
async fn test_changed_since_on_missing_dir_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let repo = JsonRevisionRepository::new(temp_dir.path().join("never-created"), 20);

    let changed = repo.changed_since(Utc::now() - Duration::days(7)).await.unwrap();
    assert!(changed.is_empty());
}
