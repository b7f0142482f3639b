//! File-backed revision history.
//!
//! One JSON file per URL under the history directory, named by the SHA-256
//! of the URL. Each file holds a bounded list of revisions, oldest first.

use apiwatch_core::{CoreError, NewRevision, Repository, Revision};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::StoreError;
use crate::persistence::{load_json, load_json_or_default, save_json};

/// Default number of revisions kept per URL.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    url: String,
    revisions: Vec<Revision>,
}

/// [`Repository`] storing revisions as JSON files.
pub struct JsonRevisionRepository {
    dir: PathBuf,
    limit: usize,
    guard: Mutex<()>,
}

impl JsonRevisionRepository {
    /// Creates a repository under `dir` keeping `limit` revisions per URL
    /// (at least one).
    pub fn new(dir: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            dir: dir.into(),
            limit: limit.max(1),
            guard: Mutex::new(()),
        }
    }

    /// Returns the history directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// History file for `url`.
    pub fn file_for(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Every stored revision of `url`, oldest first.
    pub async fn history(&self, url: &str) -> Vec<Revision> {
        let file: HistoryFile = load_json_or_default(&self.file_for(url)).await;
        file.revisions
    }

    async fn append(&self, revision: Revision) -> Result<(), StoreError> {
        let _guard = self.guard.lock().await;
        let path = self.file_for(&revision.url);
        let mut file: HistoryFile = load_json_or_default(&path).await;
        file.url.clone_from(&revision.url);
        file.revisions.push(revision);
        if file.revisions.len() > self.limit {
            let excess = file.revisions.len() - self.limit;
            file.revisions.drain(..excess);
        }
        save_json(&path, &file).await
    }

    async fn scan_changed(&self, since: DateTime<Utc>) -> Result<Vec<Revision>, StoreError> {
        let mut changed = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(changed),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_json::<HistoryFile>(&path).await {
                Ok(file) => changed.extend(
                    file.revisions
                        .into_iter()
                        .filter(|r| r.has_changes && r.created_at >= since),
                ),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable history file"),
            }
        }

        changed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(changed)
    }
}

#[async_trait]
impl Repository for JsonRevisionRepository {
    async fn latest(&self, url: &str) -> Result<Option<Revision>, CoreError> {
        Ok(self.history(url).await.pop())
    }

    #[instrument(skip(self, revision), fields(url = %revision.url))]
    async fn save(&self, revision: NewRevision) -> Result<(), CoreError> {
        self.append(revision.into_revision()).await?;
        debug!("Revision saved");
        Ok(())
    }

    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Revision>, CoreError> {
        Ok(self.scan_changed(since).await?)
    }
}
