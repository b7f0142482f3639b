//! Content validation and kind detection.
//!
//! A 200 response is not necessarily documentation: hosting providers serve
//! soft 404 pages, and JSON endpoints wrap failures in an error envelope.
//! [`ContentProcessor::validate`] rejects those before they are compared.

use apiwatch_core::ContentKind;
use apiwatch_fetch::FetchError;
use serde_json::{Map, Value};
use tracing::warn;

/// Default ceiling on bodies parsed as JSON, in characters.
pub const DEFAULT_MAX_JSON_PARSE_CHARS: usize = 2 * 1024 * 1024;

/// Non-JSON bodies shorter than this are rejected.
pub const MIN_TEXT_LENGTH: usize = 100;

/// How much of the body is scanned for error-page markers.
const ERROR_SCAN_CHARS: usize = 1000;

/// Markers of an error page near the top of the body, lowercase.
const ERROR_PAGE_MARKERS: &[&str] = &[
    "<title>404",
    "<title>not found",
    "<title>error",
    "<title>forbidden",
    "<h1>404",
    "<h1>not found",
    "<h1>error",
    "<h1>forbidden",
    "<h1>500",
    "<h1>internal server error",
];

/// Phrases that mark a whole HTML document as an error page, lowercase.
const ERROR_PAGE_PHRASES: &[&str] = &[
    "404 not found",
    "page not found",
    "403 forbidden",
    "500 internal server error",
    "service unavailable",
];

/// Validates fetched bodies and decides their [`ContentKind`].
#[derive(Debug, Clone, Copy)]
pub struct ContentProcessor {
    max_json_parse_chars: usize,
}

impl Default for ContentProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JSON_PARSE_CHARS)
    }
}

impl ContentProcessor {
    /// Creates a processor that parses at most `max_json_parse_chars` as JSON.
    pub fn new(max_json_parse_chars: usize) -> Self {
        Self {
            max_json_parse_chars: max_json_parse_chars.max(1),
        }
    }

    /// Parses `content` as JSON if it looks like JSON and is small enough.
    fn parse_json(&self, content: &str) -> Option<Value> {
        let looks_like_json = matches!(content.trim_start().chars().next(), Some('{' | '['));
        if !looks_like_json || content.chars().count() > self.max_json_parse_chars {
            return None;
        }
        serde_json::from_str(content).ok()
    }

    /// Checks that `content` fetched with `status` is usable documentation.
    ///
    /// Fails with [`FetchError::ContentInvalid`] naming the reason.
    pub fn validate(&self, url: &str, content: &str, status: u16) -> Result<(), FetchError> {
        let reason = self.invalid_reason(content, status);
        match reason {
            None => Ok(()),
            Some(reason) => {
                warn!(url, status, reason = %reason, "Invalid response");
                Err(FetchError::ContentInvalid(reason))
            }
        }
    }

    fn invalid_reason(&self, content: &str, status: u16) -> Option<String> {
        if content.is_empty() {
            return Some("Empty response".to_string());
        }
        if !(200..300).contains(&status) {
            return Some(format!("HTTP {status}"));
        }

        if let Some(data) = self.parse_json(content) {
            return data.as_object().and_then(json_error_reason);
        }

        let length = content.chars().count();
        if length < MIN_TEXT_LENGTH {
            return Some(format!("Short response ({length} chars)"));
        }

        let start: String = content.chars().take(ERROR_SCAN_CHARS).collect::<String>().to_lowercase();

        if let Some(marker) = ERROR_PAGE_MARKERS.iter().find(|m| start.contains(*m)) {
            let label = marker.split_once('>').map_or(*marker, |(_, rest)| rest);
            return Some(format!("Error page: {label}"));
        }

        let is_html_document = start.starts_with("<!doctype html>") || start.starts_with("<html");
        if is_html_document && ERROR_PAGE_PHRASES.iter().any(|p| start.contains(p)) {
            return Some("HTML error page detected".to_string());
        }

        None
    }

    /// Decides the kind of `content` fetched from `url`.
    ///
    /// A URL mentioning `openapi` or `swagger` is an API spec whatever the
    /// body looks like; YAML specs are only recognized that way.
    pub fn detect_kind(&self, url: &str, content: &str) -> ContentKind {
        let lowered = url.to_lowercase();
        if lowered.contains("openapi") || lowered.contains("swagger") {
            return ContentKind::ApiSpec;
        }

        match self.parse_json(content) {
            Some(Value::Object(map)) if map.contains_key("openapi") || map.contains_key("swagger") => {
                ContentKind::ApiSpec
            }
            Some(_) => ContentKind::Json,
            None => ContentKind::Html,
        }
    }
}

fn json_error_reason(data: &Map<String, Value>) -> Option<String> {
    if let Some(error) = data.get("error").filter(|e| is_truthy(e)) {
        return Some(format!("JSON error: {}", display_value(error)));
    }

    let message = || {
        data.get("message")
            .map_or_else(|| "Unknown error".to_string(), display_value)
    };

    if data.get("success") == Some(&Value::Bool(false)) {
        return Some(format!("API error: {}", message()));
    }

    if let Some(status) = data.get("status") {
        let status = display_value(status).to_lowercase();
        if matches!(status.as_str(), "error" | "fail" | "failed") {
            return Some(format!("Status error: {}", message()));
        }
    }

    None
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
