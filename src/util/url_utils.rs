//! URL helpers for chat and resume pages.
//!
//! The job site addresses conversations as `/chat/<digits>` and resumes as
//! `/resume/<hex-hash>`; these helpers build and parse those shapes.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RESUME_ID_RE: Regex =
        Regex::new(r"/resume/([a-f0-9]+)").expect("resume id regex is valid");
    static ref CHAT_ID_RE: Regex = Regex::new(r"/chat/(\d+)").expect("chat id regex is valid");
}

/// Build the conversation URL for a chat id
#[must_use]
pub fn chat_url(base: &str, chat_id: &str) -> String {
    format!("{}/chat/{}", base.trim_end_matches('/'), chat_id)
}

/// Extract the resume identifier (lowercase hex hash) from a resume URL
///
/// Returns `None` when the URL does not match the expected shape; callers
/// fail the link without attempting any tab operation.
#[must_use]
pub fn extract_resume_id(url: &str) -> Option<String> {
    RESUME_ID_RE
        .captures(url)
        .map(|c| c[1].to_string())
}

/// Extract the numeric chat id from a conversation URL
#[must_use]
pub fn extract_chat_id(url: &str) -> Option<String> {
    CHAT_ID_RE.captures(url).map(|c| c[1].to_string())
}

/// Check that a URL is an http(s) URL we are willing to drive a tab to
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
