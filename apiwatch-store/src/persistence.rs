//! File persistence helpers.
//!
//! JSON files are rewritten wholesale through a temp file and a rename, so a
//! crash never leaves a half-written quota or history file behind.

use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::error::StoreError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - Linux: `~/.config/apiwatch`
/// - macOS: `~/Library/Application Support/apiwatch`
/// - Windows: `%APPDATA%\apiwatch`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|c| c.join("apiwatch"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default data directory (quota ledger, revision history).
///
/// - Linux: `~/.local/share/apiwatch`
/// - macOS: `~/Library/Application Support/apiwatch`
/// - Windows: `%APPDATA%\apiwatch\data`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("apiwatch"))
        .unwrap_or_else(|| PathBuf::from(".apiwatch"))
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

/// Returns the quota ledger path inside `data_dir`.
pub fn quota_path(data_dir: &Path) -> PathBuf {
    data_dir.join("quota.json")
}

/// Returns the process lock path inside `data_dir`.
pub fn lock_path(data_dir: &Path) -> PathBuf {
    data_dir.join("apiwatch.lock")
}

/// Returns the revision history directory inside `data_dir`.
pub fn history_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("history")
}

// ============================================================================
// Security: File Permissions
// ============================================================================

/// Sets restrictive file permissions (0o600) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0600", "Set restrictive permissions");
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Temp file next to `path`, unique per process and call.
fn temp_path_for(path: &Path) -> PathBuf {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    path.with_file_name(format!(".{name}.tmp.{}.{counter}", std::process::id()))
}

/// Saves data to a JSON file.
///
/// Creates parent directories if they don't exist, writes atomically
/// (via temp file + rename), and sets restrictive permissions on Unix.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");

    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let json = serde_json::to_string_pretty(data)?;

    let temp_path = temp_path_for(path);
    tokio::fs::write(&temp_path, &json).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    set_restrictive_permissions(path).await?;

    debug!(path = %path.display(), bytes = json.len(), "JSON file saved");
    Ok(())
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");

    let content = tokio::fs::read_to_string(path).await?;
    let data = serde_json::from_str(&content)?;

    Ok(data)
}

/// Loads data from a JSON file, returning default if missing or corrupt.
///
/// A missing file is silent; anything else is logged.
pub async fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path).await {
        Ok(data) => data,
        Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load, using defaults");
            T::default()
        }
    }
}

/// Ensures a directory exists.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("config.json"));
    }

    #[test]
    fn test_data_paths() {
        let dir = Path::new("/var/lib/apiwatch");
        assert_eq!(quota_path(dir), dir.join("quota.json"));
        assert_eq!(lock_path(dir), dir.join("apiwatch.lock"));
        assert_eq!(history_dir(dir), dir.join("history"));
    }

    #[test]
    fn test_temp_paths_are_unique() {
        let path = Path::new("/tmp/quota.json");
        let a = temp_path_for(path);
        let b = temp_path_for(path);
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.json");

        save_json(&test_file, &serde_json::json!({})).await.unwrap();

        let metadata = tokio::fs::metadata(&test_file).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "File should have 0600 permissions");
    }
}
