//! JSON output formatting.

use anyhow::Result;
use apiwatch_detect::ContentProcessor;
use apiwatch_fetch::{FetchError, FetchOutcome, FetchStats, FetchStrategyKind};
use apiwatch_store::QuotaSnapshot;
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// Result of the fetch command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutput {
    pub url: String,
    pub status_code: u16,
    pub succeeded: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chars: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

impl FetchOutput {
    /// Summarizes `outcome`, validating a successful body with `processor`.
    pub fn from_outcome(outcome: &FetchOutcome, processor: &ContentProcessor) -> Self {
        let error = (!outcome.succeeded).then(|| outcome.failure_reason());
        let body = outcome.success_content();

        let (kind, invalid_reason) = match body {
            Some(content) => {
                let invalid = match processor.validate(&outcome.source_url, content, outcome.status_code) {
                    Ok(()) => None,
                    Err(FetchError::ContentInvalid(reason)) => Some(reason),
                    Err(other) => Some(other.to_string()),
                };
                let kind = processor.detect_kind(&outcome.source_url, content);
                (Some(kind.as_str().to_string()), invalid)
            }
            None => (None, None),
        };

        Self {
            url: outcome.source_url.clone(),
            status_code: outcome.status_code,
            succeeded: outcome.succeeded,
            attempts: outcome.attempts,
            error,
            chars: body.map(|c| c.chars().count()),
            kind,
            invalid_reason,
        }
    }
}

/// Result of the quota command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaOutput {
    pub service: String,
    pub daily_limit: i64,
    pub quota: QuotaSnapshot,
    pub fetch: FetchStats,
}

impl QuotaOutput {
    /// Requests counted today for the proxy service.
    pub fn used(&self) -> u64 {
        self.quota.counts.get(&self.service).copied().unwrap_or(0)
    }
}

/// Result of the check-config command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigCheckOutput {
    pub config_path: String,
    pub config_exists: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data_dir: String,
    pub history_dir: String,
    pub quota_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets_file: Option<String>,
    pub strategy: FetchStrategyKind,
    pub proxy_configured: bool,
    pub check_interval_secs: u64,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }
}
