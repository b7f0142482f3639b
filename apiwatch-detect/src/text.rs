//! HTML to normalized text.
//!
//! Pages are compared on their visible text, not on markup, so rotating
//! script bundles or reordered attributes do not register as changes.

use apiwatch_core::TextExtractor;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Default ceiling on HTML fed to the extractor, in characters.
pub const DEFAULT_MAX_HTML_CHARS: usize = 500_000;

/// Inserted between the head and tail of truncated HTML.
pub const TRUNCATION_MARKER: &str = "\n<!-- apiwatch: truncated_html_to_text -->\n";

// ============================================================================
// Regex Patterns
// ============================================================================

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid regex"));

static HIDDEN_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<template\b.*?</template\s*>",
    )
    .expect("Invalid regex")
});

/// Links keep their target so a moved reference counts as a change.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
        .expect("Invalid regex")
});

static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|br|hr|h[1-6]|li|ul|ol|dl|dt|dd|tr|table|thead|tbody|section|article|header|footer|nav|main|aside|pre|blockquote|title)\b[^>]*>",
    )
    .expect("Invalid regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("Invalid regex")
});

static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\x0B\x0C\u{a0}]+").expect("Invalid regex"));

// ============================================================================
// Extractor
// ============================================================================

/// Regex-based [`TextExtractor`].
///
/// Drops comments and script, style, noscript and template blocks, turns
/// block-level tags into line breaks, keeps link targets, strips remaining
/// tags, decodes entities and collapses whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTextExtractor;

impl HtmlTextExtractor {
    /// Creates the extractor.
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for HtmlTextExtractor {
    fn extract(&self, html: &str) -> String {
        let text = COMMENT_RE.replace_all(html, "");
        let text = HIDDEN_BLOCK_RE.replace_all(&text, "");
        let text = LINK_RE.replace_all(&text, |caps: &Captures<'_>| {
            let href = &caps[1];
            let label = caps[2].trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                label.to_string()
            } else {
                format!("{label} ({href})")
            }
        });
        let text = BLOCK_TAG_RE.replace_all(&text, "\n");
        let text = TAG_RE.replace_all(&text, "");
        let text = decode_entities(&text);

        text.lines()
            .map(|line| SPACE_RE.replace_all(line, " ").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Decodes named and numeric character references.
///
/// Unknown names are left as they are.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    ENTITY_RE.replace_all(text, |caps: &Captures<'_>| {
        let body = &caps[1];
        let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = body.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32)
        } else {
            named_entity(body)
        };
        decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
    })
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "laquo" => '\u{ab}',
        "raquo" => '\u{bb}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "bull" => '\u{2022}',
        "middot" => '\u{b7}',
        "times" => '\u{d7}',
        "rarr" => '\u{2192}',
        "larr" => '\u{2190}',
        _ => return None,
    };
    Some(c)
}

// ============================================================================
// Truncation
// ============================================================================

/// Keeps the first and last `max_chars / 2` characters of oversized input,
/// joined by [`TRUNCATION_MARKER`].
///
/// Input within the limit is returned unchanged. Cuts fall on character
/// boundaries.
pub fn truncate_head_tail(text: &str, max_chars: usize) -> Cow<'_, str> {
    let max_chars = max_chars.max(1);
    let total = text.chars().count();
    if total <= max_chars {
        return Cow::Borrowed(text);
    }

    let half = max_chars / 2;
    let head_end = text.char_indices().nth(half).map_or(text.len(), |(i, _)| i);
    let tail_start = if half == 0 {
        text.len()
    } else {
        text.char_indices()
            .nth(total - half)
            .map_or(text.len(), |(i, _)| i)
    };

    Cow::Owned(format!(
        "{}{}{}",
        &text[..head_end],
        TRUNCATION_MARKER,
        &text[tail_start..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_strips_markup() {
        let html = r#"<html><head><title>Docs</title><style>p { color: red; }</style>
            <script>var x = "<p>nope</p>";</script></head>
            <body><!-- build 1234 --><h1>Pets   API</h1><p>List&nbsp;all pets &amp; owners.</p>
            <ul><li>GET /pets</li><li>POST&#32;/pets</li></ul></body></html>"#;

        let text = HtmlTextExtractor.extract(html);
        assert_eq!(
            text,
            "Docs\nPets API\nList all pets & owners.\nGET /pets\nPOST /pets"
        );
    }

    #[test]
    fn test_extract_keeps_link_targets() {
        let html = r##"<p>See <a href="/v2/pets">the pets page</a> or <a href="#top">top</a>.</p>"##;
        assert_eq!(
            HtmlTextExtractor.extract(html),
            "See the pets page (/v2/pets) or top."
        );
    }

    #[test]
    fn test_markup_only_changes_are_invisible() {
        let old = r#"<div class="a"><script src="/app.1.js"></script><p>Hello</p></div>"#;
        let new = r#"<div class="b"><script src="/app.2.js"></script><p>Hello</p></div>"#;
        assert_eq!(HtmlTextExtractor.extract(old), HtmlTextExtractor.extract(new));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("&lt;b&gt; &#x41;&#66; &unknown;"), "<b> AB &unknown;");
    }

    #[test]
    fn test_truncate_within_limit_borrows() {
        assert!(matches!(truncate_head_tail("short", 10), Cow::Borrowed("short")));
    }

    #[test]
    fn test_truncate_keeps_head_and_tail() {
        let text = "abcdefghij";
        assert_eq!(
            truncate_head_tail(text, 4),
            format!("ab{TRUNCATION_MARKER}ij")
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "ééééééé";
        let truncated = truncate_head_tail(text, 4);
        assert_eq!(truncated, format!("éé{TRUNCATION_MARKER}éé"));
    }
}
