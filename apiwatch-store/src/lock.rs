//! Single-instance process lock.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Exclusive lock file stamped with the owning pid.
///
/// Created with `create_new`, so a second watcher fails to start while the
/// first one holds it. Removed on drop, whatever the exit path.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    /// Takes the lock at `path`.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(StoreError::Locked { path, holder });
            }
            Err(e) => return Err(e.into()),
        };

        let pid = std::process::id();
        if let Err(e) = writeln!(file, "{pid}").and_then(|()| file.flush()) {
            let _ = std::fs::remove_file(&path);
            return Err(e.into());
        }

        debug!(path = %path.display(), pid, "Process lock acquired");
        Ok(Self { path })
    }

    /// Returns the lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Process lock released"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove lock file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run").join("apiwatch.lock");

        let lock = ProcessLock::acquire(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        match ProcessLock::acquire(&path) {
            Err(StoreError::Locked { holder, .. }) => {
                assert_eq!(holder, std::process::id().to_string());
            }
            other => panic!("expected Locked, got {other:?}"),
        }

        drop(lock);
        assert!(!path.exists());
        assert!(ProcessLock::acquire(&path).is_ok());
    }
}
