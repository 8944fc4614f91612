//! HTML cleaning for captured resume pages.
//!
//! Resume pages come back from the worker as full documents; before they are
//! persisted the obvious waste is stripped:
//! - `<script>` and `<style>` tags and their contents
//! - HTML comments
//! - `<meta>`, `<link>` and `<noscript>` tags
//! - Inline event handlers and style attributes
//! - Tracking attributes (`data-gtm-*`, `data-analytics-*`)
//! - Redundant whitespace
//!
//! The pipeline is lossy on purpose: the stored HTML feeds a structured
//! parser, not a renderer.

use regex::Regex;
use std::sync::LazyLock;

// Compile regex patterns once at first use.
// These are hardcoded patterns that will never fail to compile.

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script>").expect("SCRIPT_RE: hardcoded regex is valid")
});

static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>.*?</style>").expect("STYLE_RE: hardcoded regex is valid")
});

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("COMMENT_RE: hardcoded regex is valid"));

static HEAD_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:meta|link|noscript)\b[^>]*>")
        .expect("HEAD_TAG_RE: hardcoded regex is valid")
});

static EVENT_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s*on\w+\s*=\s*["'][^"']*["']"#)
        .expect("EVENT_ATTR_RE: hardcoded regex is valid")
});

static STYLE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s*style\s*=\s*["'][^"']*["']"#)
        .expect("STYLE_ATTR_RE: hardcoded regex is valid")
});

static TRACKING_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s*data-(?:gtm|analytics)-[\w-]+\s*=\s*["'][^"']*["']"#)
        .expect("TRACKING_ATTR_RE: hardcoded regex is valid")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("WHITESPACE_RE: hardcoded regex is valid"));

static INTER_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("INTER_TAG_RE: hardcoded regex is valid"));

/// Result of one cleaning pass, with the size bookkeeping the registry
/// stores alongside the content.
#[derive(Debug, Clone)]
pub struct CleanedHtml {
    pub html: String,
    pub original_size: usize,
    pub cleaned_size: usize,
    pub reduction_percent: u8,
}

/// Strip scripts, styles, comments, head-only tags, handler/style/tracking
/// attributes and redundant whitespace from an HTML document.
#[must_use]
pub fn clean_html(html: &str) -> CleanedHtml {
    let original_size = html.len();

    let cleaned = SCRIPT_RE.replace_all(html, "");
    let cleaned = STYLE_RE.replace_all(&cleaned, "");
    let cleaned = COMMENT_RE.replace_all(&cleaned, "");
    let cleaned = HEAD_TAG_RE.replace_all(&cleaned, "");
    let cleaned = EVENT_ATTR_RE.replace_all(&cleaned, "");
    let cleaned = STYLE_ATTR_RE.replace_all(&cleaned, "");
    let cleaned = TRACKING_ATTR_RE.replace_all(&cleaned, "");
    let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ");
    let cleaned = INTER_TAG_RE.replace_all(&cleaned, "><");

    let html = cleaned.trim().to_string();
    let cleaned_size = html.len();
    let reduction_percent = if original_size == 0 {
        0
    } else {
        (100 - cleaned_size * 100 / original_size).min(100) as u8
    };

    CleanedHtml {
        html,
        original_size,
        cleaned_size,
        reduction_percent,
    }
}
