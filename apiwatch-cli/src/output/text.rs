//! Text output formatting with colors.

use apiwatch_core::{Decision, DecisionOutcome, Severity};
use apiwatch_detect::CycleReport;
use apiwatch_fetch::FetchOutcome;

use super::json::{ConfigCheckOutput, FetchOutput, QuotaOutput};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

/// Characters of body shown by `fetch` without `--full`.
const PREVIEW_CHARS: usize = 500;

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    preview_chars: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            preview_chars: PREVIEW_CHARS,
        }
    }

    /// Sets how much body the fetch preview shows.
    #[cfg(test)]
    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    // ========================================================================
    // Watch cycle
    // ========================================================================

    /// Formats a cycle report, one block per target and a summary line.
    pub fn format_report(&self, report: &CycleReport) -> String {
        let mut lines = Vec::new();

        for outcome in &report.outcomes {
            lines.extend(self.format_outcome(outcome));
        }

        let summary = &report.summary;
        let changed = format!("{} changed", summary.changed);
        let failed = format!("{} failed", summary.failed);
        lines.push(format!(
            "{} targets, {}, {}",
            summary.total,
            if summary.changed > 0 { self.yellow(&changed) } else { changed },
            if summary.failed > 0 { self.red(&failed) } else { failed },
        ));

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Formats one target's outcome.
    pub fn format_outcome(&self, outcome: &DecisionOutcome) -> Vec<String> {
        let mut lines = vec![format!("{}  {}", self.bold(&outcome.url), self.decision_label(outcome))];

        if outcome.has_changes() {
            if let Some(summary) = &outcome.summary {
                lines.push(format!("    {summary}"));
            }
            for change in &outcome.key_changes {
                lines.push(format!("    - {change}"));
            }
        }
        lines
    }

    fn decision_label(&self, outcome: &DecisionOutcome) -> String {
        match &outcome.decision {
            Decision::FirstSnapshot => self.cyan("baseline stored"),
            Decision::Unchanged => self.dim("unchanged"),
            Decision::Insignificant => self.dim("insignificant change"),
            Decision::Changed => {
                let severity = outcome.severity.unwrap_or_default();
                self.severity_color(severity, &format!("changed ({severity})"))
            }
            Decision::Failed(reason) => self.red(&format!("failed: {reason}")),
        }
    }

    fn severity_color(&self, severity: Severity, text: &str) -> String {
        match severity {
            Severity::Major => self.red(text),
            Severity::Moderate => self.yellow(text),
            Severity::Minor => self.blue(text),
        }
    }

    // ========================================================================
    // Fetch
    // ========================================================================

    /// Formats the fetch command result, followed by a preview of the body.
    pub fn format_fetch(&self, output: &FetchOutput, outcome: &FetchOutcome, full: bool) -> String {
        let mut lines = vec![self.bold(&output.url)];

        let attempts = if output.attempts == 1 {
            "1 attempt".to_string()
        } else {
            format!("{} attempts", output.attempts)
        };
        let status = if output.status_code == 0 {
            "no response".to_string()
        } else {
            output.status_code.to_string()
        };
        lines.push(format!("  Status:   {status} ({attempts})"));

        if let Some(error) = &output.error {
            lines.push(format!("  Error:    {}", self.red(error)));
        }
        if let Some(kind) = &output.kind {
            lines.push(format!("  Kind:     {kind}"));
        }
        if let Some(chars) = output.chars {
            lines.push(format!("  Size:     {chars} chars"));
        }
        if output.succeeded {
            let valid = match &output.invalid_reason {
                None => self.green("yes"),
                Some(reason) => self.yellow(&format!("no ({reason})")),
            };
            lines.push(format!("  Valid:    {valid}"));
        }

        let mut out = lines.join("\n");
        out.push('\n');

        if let Some(body) = outcome.success_content() {
            out.push('\n');
            if full {
                out.push_str(body);
            } else {
                out.push_str(&self.preview(body));
            }
            out.push('\n');
        }
        out
    }

    fn preview(&self, body: &str) -> String {
        let total = body.chars().count();
        if total <= self.preview_chars {
            return body.to_string();
        }
        let head: String = body.chars().take(self.preview_chars).collect();
        format!(
            "{head}\n{}",
            self.dim(&format!("... {} more chars (use --full)", total - self.preview_chars))
        )
    }

    // ========================================================================
    // Quota
    // ========================================================================

    /// Formats proxy usage and circuit state.
    pub fn format_quota(&self, output: &QuotaOutput) -> String {
        let mut lines = vec![format!(
            "{} {}",
            self.bold("Proxy quota"),
            self.dim(&format!("({})", output.quota.date))
        )];

        let limit = match output.daily_limit {
            l if l < 0 => "unlimited".to_string(),
            0 => "disabled".to_string(),
            l => l.to_string(),
        };
        lines.push(format!("  {}: {} / {}", output.service, output.used(), limit));

        let others = output
            .quota
            .counts
            .iter()
            .filter(|(service, _)| **service != output.service);
        for (service, count) in others {
            lines.push(format!("  {service}: {count}"));
        }

        lines.push(format!("  Strategy: {}", output.fetch.strategy));

        let proxy = match &output.fetch.proxy {
            None => self.dim("not configured"),
            Some(stats) if stats.disabled => {
                let reason = stats
                    .disabled_reason
                    .map_or_else(|| "unknown".to_string(), |r| r.to_string());
                self.red(&format!("disabled ({reason})"))
            }
            Some(_) => self.green("active"),
        };
        lines.push(format!("  Proxy:    {proxy}"));

        if let Some(stats) = &output.fetch.proxy {
            if stats.consecutive_errors > 0 {
                lines.push(format!("  Consecutive errors: {}", stats.consecutive_errors));
            }
            if !stats.blocked_domains.is_empty() {
                lines.push(format!(
                    "  Blocked domains: {}",
                    self.yellow(&stats.blocked_domains.join(", "))
                ));
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    // ========================================================================
    // Config
    // ========================================================================

    /// Formats the check-config result.
    pub fn format_config_check(&self, output: &ConfigCheckOutput) -> String {
        let status = match &output.error {
            None => self.green("✓ valid"),
            Some(error) => self.red(&format!("✗ {error}")),
        };
        let file = if output.config_exists {
            output.config_path.clone()
        } else {
            format!("{} {}", output.config_path, self.dim("(not found, using defaults)"))
        };

        let mut lines = vec![
            format!("{} {}", self.bold("Configuration"), status),
            format!("  File:       {file}"),
            format!("  Data dir:   {}", output.data_dir),
            format!("  History:    {}", output.history_dir),
            format!("  Quota file: {}", output.quota_file),
        ];
        if let Some(lock) = &output.lock_file {
            lines.push(format!("  Lock file:  {lock}"));
        }
        lines.push(format!(
            "  Targets:    {}",
            output.targets_file.as_deref().unwrap_or("(not set)")
        ));
        lines.push(format!("  Strategy:   {}", output.strategy));
        lines.push(format!(
            "  Proxy:      {}",
            if output.proxy_configured { "configured" } else { "not configured" }
        ));
        lines.push(format!("  Interval:   {}s", output.check_interval_secs));

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    // ========================================================================
    // Colors
    // ========================================================================

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}
