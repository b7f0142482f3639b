//! Notification fan-out.

use apiwatch_core::{ChangeNotification, CoreError, DigestEntry, DocumentationUpdate, Notifier};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

// ============================================================================
// Log Notifier
// ============================================================================

/// Notifier that writes to the tracing log. Always registered by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_change(&self, notification: &ChangeNotification) -> Result<(), CoreError> {
        info!(
            api = %notification.api_name,
            method = notification.method_name.as_deref().unwrap_or("-"),
            url = %notification.url,
            severity = %notification.severity,
            key_changes = notification.key_changes.len(),
            "Change detected: {}",
            notification.summary
        );
        Ok(())
    }

    async fn send_digest(&self, entries: &[DigestEntry]) -> Result<(), CoreError> {
        info!(changes = entries.len(), "Digest");
        for entry in entries {
            info!(
                api = entry.api_name.as_deref().unwrap_or("-"),
                url = %entry.url,
                at = %entry.created_at.format("%Y-%m-%d %H:%M"),
                "  {}",
                entry.summary
            );
        }
        Ok(())
    }

    async fn send_doc_update(&self, update: &DocumentationUpdate) -> Result<(), CoreError> {
        info!(
            api = %update.api_name,
            old_url = %update.old_url,
            new_url = %update.new_url,
            doc_type = %update.doc_type,
            "Documentation moved"
        );
        Ok(())
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Sends every message to all registered notifiers.
///
/// A failing notifier is logged and skipped; the others still receive the
/// message. Each `send_*` returns how many notifiers accepted it.
pub struct NotifierManager {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Default for NotifierManager {
    fn default() -> Self {
        let mut manager = Self::empty();
        manager.register(Arc::new(LogNotifier));
        manager
    }
}

impl NotifierManager {
    /// A manager with no notifiers.
    pub fn empty() -> Self {
        Self {
            notifiers: Vec::new(),
        }
    }

    /// Adds a notifier.
    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Number of registered notifiers.
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Names of the registered notifiers.
    pub fn names(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// Reports one change.
    pub async fn send_change(&self, notification: &ChangeNotification) -> usize {
        let mut delivered = 0;
        for notifier in &self.notifiers {
            match notifier.send_change(notification).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(notifier = notifier.name(), url = %notification.url, error = %e, "Failed to send change"),
            }
        }
        delivered
    }

    /// Sends the digest.
    pub async fn send_digest(&self, entries: &[DigestEntry]) -> usize {
        let mut delivered = 0;
        for notifier in &self.notifiers {
            match notifier.send_digest(entries).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(notifier = notifier.name(), error = %e, "Failed to send digest"),
            }
        }
        delivered
    }

    /// Reports a documentation URL replacement.
    pub async fn send_doc_update(&self, update: &DocumentationUpdate) -> usize {
        let mut delivered = 0;
        for notifier in &self.notifiers {
            match notifier.send_doc_update(update).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(notifier = notifier.name(), url = %update.new_url, error = %e, "Failed to send documentation update"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiwatch_core::Severity;

    struct Broken;

    #[async_trait]
    impl Notifier for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn send_change(&self, _: &ChangeNotification) -> Result<(), CoreError> {
            Err(CoreError::Notify("webhook returned 500".into()))
        }

        async fn send_digest(&self, _: &[DigestEntry]) -> Result<(), CoreError> {
            Err(CoreError::Notify("webhook returned 500".into()))
        }

        async fn send_doc_update(&self, _: &DocumentationUpdate) -> Result<(), CoreError> {
            Err(CoreError::Notify("webhook returned 500".into()))
        }
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_block_others() {
        let mut manager = NotifierManager::default();
        manager.register(Arc::new(Broken));
        assert_eq!(manager.names(), vec!["log", "broken"]);

        let notification = ChangeNotification {
            api_name: "Pets".into(),
            method_name: None,
            url: "https://a.example/docs".into(),
            summary: "Changes detected".into(),
            severity: Severity::Moderate,
            key_changes: Vec::new(),
        };
        assert_eq!(manager.send_change(&notification).await, 1);
        assert_eq!(manager.send_digest(&[]).await, 1);
    }

    #[tokio::test]
    async fn test_empty_manager_delivers_nothing() {
        let manager = NotifierManager::empty();
        assert!(manager.is_empty());
        assert_eq!(manager.send_digest(&[]).await, 0);
    }
}
