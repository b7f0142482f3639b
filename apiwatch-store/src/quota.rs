//! Durable daily quota ledger.
//!
//! On-disk format, rewritten wholesale on every change:
//!
//! ```json
//! { "2026-03-01": { "zenrows": 412 } }
//! ```
//!
//! Every operation reloads the file, so a restart mid-day picks up exactly
//! where the last successful write left off. Only the current date is kept.
//! A missing file is an empty ledger. A file that exists but cannot be read
//! refuses every call until it is repaired or removed.

use apiwatch_core::{local_date_source, DateSource, QuotaLedger};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::error::StoreError;
use crate::persistence::{load_json, save_json};

/// `date -> service -> count`.
type Ledger = BTreeMap<String, BTreeMap<String, u64>>;

/// Today's counters, for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    /// The active date.
    pub date: NaiveDate,
    /// Count per service.
    pub counts: BTreeMap<String, u64>,
}

/// Day-scoped request counter backed by a JSON file.
pub struct QuotaTracker {
    path: PathBuf,
    today: DateSource,
    guard: Mutex<()>,
}

impl QuotaTracker {
    /// Creates a tracker over `path` using `today` for rollover.
    ///
    /// Nothing is read until the first operation.
    pub fn new(path: impl Into<PathBuf>, today: DateSource) -> Self {
        Self {
            path: path.into(),
            today,
            guard: Mutex::new(()),
        }
    }

    /// Creates a tracker that rolls over at local midnight.
    pub fn with_local_date(path: impl Into<PathBuf>) -> Self {
        Self::new(path, local_date_source())
    }

    /// Returns the ledger file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Today's count for `service`.
    pub async fn get_usage(&self, service: &str) -> u64 {
        let _guard = self.guard.lock().await;
        match self.load_current().await {
            Ok((ledger, today)) => count_for(&ledger, &today, service),
            Err(_) => 0,
        }
    }

    /// Adds `count` to today's total for `service` unless that would pass
    /// `limit`.
    ///
    /// A negative limit means unlimited (the count is still recorded); zero
    /// disables the service. Returns false without mutating when rejected,
    /// when the ledger cannot be loaded, and when the new total could not be
    /// persisted.
    #[instrument(skip(self))]
    pub async fn try_increment(&self, service: &str, limit: i64, count: u64) -> bool {
        let _guard = self.guard.lock().await;
        let Ok((mut ledger, today)) = self.load_current().await else {
            return false;
        };
        let current = count_for(&ledger, &today, service);
        let total = current.saturating_add(count);

        if !within_limit(total, limit) {
            warn!(current, limit, "Daily quota would be exceeded");
            return false;
        }

        ledger
            .entry(today)
            .or_default()
            .insert(service.to_string(), total);
        if let Err(e) = save_json(&self.path, &ledger).await {
            error!(error = %e, path = %self.path.display(), "Failed to persist quota, refusing call");
            return false;
        }

        debug!(total, limit, "Quota incremented");
        true
    }

    /// Returns true if one more call for `service` fits `limit`.
    pub async fn can_use(&self, service: &str, limit: i64) -> bool {
        let _guard = self.guard.lock().await;
        let Ok((ledger, today)) = self.load_current().await else {
            return false;
        };
        within_limit(count_for(&ledger, &today, service).saturating_add(1), limit)
    }

    /// Today's counters for every service.
    pub async fn snapshot(&self) -> QuotaSnapshot {
        let _guard = self.guard.lock().await;
        let counts = match self.load_current().await {
            Ok((mut ledger, today)) => ledger.remove(&today).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };
        QuotaSnapshot {
            date: (self.today)(),
            counts,
        }
    }

    /// Loads the ledger and drops every date but today.
    ///
    /// Must be called with `guard` held.
    async fn load_current(&self) -> Result<(Ledger, String), StoreError> {
        let today = (self.today)().to_string();
        let mut ledger: Ledger = match load_json(&self.path).await {
            Ok(ledger) => ledger,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ledger::new(),
            Err(e) => {
                error!(error = %e, path = %self.path.display(), "Quota ledger unreadable, refusing calls");
                return Err(e);
            }
        };

        let before = ledger.len();
        ledger.retain(|date, _| *date == today);
        if ledger.len() != before {
            info!(date = %today, dropped = before - ledger.len(), "Quota window rolled over");
            if let Err(e) = save_json(&self.path, &ledger).await {
                warn!(error = %e, "Failed to persist quota rollover");
            }
        }

        Ok((ledger, today))
    }
}

fn count_for(ledger: &Ledger, today: &str, service: &str) -> u64 {
    ledger
        .get(today)
        .and_then(|services| services.get(service))
        .copied()
        .unwrap_or(0)
}

fn within_limit(total: u64, limit: i64) -> bool {
    match u64::try_from(limit) {
        Err(_) => true,
        Ok(0) => false,
        Ok(limit) => total <= limit,
    }
}

#[async_trait]
impl QuotaLedger for QuotaTracker {
    async fn usage(&self, service: &str) -> u64 {
        self.get_usage(service).await
    }

    async fn try_increment(&self, service: &str, limit: i64, count: u64) -> bool {
        QuotaTracker::try_increment(self, service, limit, count).await
    }

    async fn can_use(&self, service: &str, limit: i64) -> bool {
        QuotaTracker::can_use(self, service, limit).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use apiwatch_core::ManualDate;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn tracker(dir: &TempDir, date: &ManualDate) -> QuotaTracker {
        QuotaTracker::new(dir.path().join("quota.json"), date.source())
    }

    #[tokio::test]
    async fn test_increment_up_to_limit() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);

        assert!(quota.try_increment("zenrows", 2, 1).await);
        assert!(quota.can_use("zenrows", 2).await);
        assert!(quota.try_increment("zenrows", 2, 1).await);
        assert!(!quota.can_use("zenrows", 2).await);
        assert!(!quota.try_increment("zenrows", 2, 1).await);
        assert_eq!(quota.get_usage("zenrows").await, 2);
    }

    #[tokio::test]
    async fn test_rejected_batch_does_not_mutate() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);

        assert!(quota.try_increment("svc", 5, 4).await);
        assert!(!quota.try_increment("svc", 5, 2).await);
        assert_eq!(quota.get_usage("svc").await, 4);
    }

    #[tokio::test]
    async fn test_negative_limit_is_unlimited_but_counted() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);

        for _ in 0..3 {
            assert!(quota.try_increment("svc", -1, 1).await);
        }
        assert!(quota.can_use("svc", -1).await);
        assert_eq!(quota.get_usage("svc").await, 3);
    }

    #[tokio::test]
    async fn test_zero_limit_disables() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);

        assert!(!quota.try_increment("svc", 0, 1).await);
        assert!(!quota.can_use("svc", 0).await);
        assert_eq!(quota.get_usage("svc").await, 0);
    }

    #[tokio::test]
    async fn test_services_are_independent() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);

        assert!(quota.try_increment("a", 1, 1).await);
        assert!(quota.try_increment("b", 1, 1).await);
        assert!(!quota.try_increment("a", 1, 1).await);
    }

    #[tokio::test]
    async fn test_rollover_discards_old_dates() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);

        assert!(quota.try_increment("svc", 1, 1).await);
        assert!(!quota.can_use("svc", 1).await);

        date.set(day(2));
        assert_eq!(quota.get_usage("svc").await, 0);
        assert!(quota.try_increment("svc", 1, 1).await);

        let raw = std::fs::read_to_string(quota.path()).unwrap();
        let on_disk: Ledger = serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk.keys().collect::<Vec<_>>(), vec!["2026-03-02"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_refuses_calls() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);
        std::fs::write(quota.path(), "{not json").unwrap();

        assert!(!quota.can_use("svc", 10).await);
        assert!(!quota.try_increment("svc", 10, 1).await);
        assert!(!quota.try_increment("svc", -1, 1).await);
        assert_eq!(quota.get_usage("svc").await, 0);
        assert!(quota.snapshot().await.counts.is_empty());
        assert_eq!(std::fs::read_to_string(quota.path()).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);

        assert!(quota.can_use("svc", 1).await);
        assert!(quota.try_increment("svc", 1, 1).await);
        assert_eq!(quota.get_usage("svc").await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_lists_today() {
        let dir = TempDir::new().unwrap();
        let date = ManualDate::new(day(1));
        let quota = tracker(&dir, &date);
        quota.try_increment("zenrows", 10, 3).await;

        let snapshot = quota.snapshot().await;
        assert_eq!(snapshot.date, day(1));
        assert_eq!(snapshot.counts.get("zenrows"), Some(&3));
    }

    #[test]
    fn test_within_limit() {
        assert!(within_limit(5, 5));
        assert!(!within_limit(6, 5));
        assert!(!within_limit(1, 0));
        assert!(within_limit(u64::MAX, -1));
    }
}
