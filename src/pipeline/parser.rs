//! Model reply parsing.
//!
//! Replies are expected to be a single JSON value, optionally wrapped in a
//! markdown code fence and sometimes followed by trailing chatter. The
//! parser strips the fence, cuts anything after the closing bracket of the
//! top-level value, and parses what remains. Nothing is coerced: a reply
//! that still fails to parse is reported with its raw text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static LEADING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*").expect("valid regex"));
static TRAILING_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*$").expect("valid regex"));

/// A reply that could not be read as JSON. Keeps the raw text for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed model reply: {message}")]
pub struct ParseError {
    pub message: String,
    pub raw: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, raw: &str) -> Self {
        Self {
            message: message.into(),
            raw: raw.to_string(),
        }
    }
}

/// Remove a leading fence line (with optional language tag) and a trailing fence.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_lead = match LEADING_FENCE_RE.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    };
    let without_trail = match TRAILING_FENCE_RE.find(without_lead) {
        Some(m) => &without_lead[..m.start()],
        None => without_lead,
    };
    without_trail.trim()
}

/// Cut text that follows the closing bracket of a top-level array or object.
fn truncate_after_value(text: &str) -> &str {
    let closing = match text.chars().next() {
        Some('[') => ']',
        Some('{') => '}',
        _ => return text,
    };
    match text.rfind(closing) {
        Some(end) => &text[..=end],
        None => text,
    }
}

/// Normalized JSON text of a reply, before parsing.
pub fn normalize_reply(raw: &str) -> &str {
    truncate_after_value(strip_code_fences(raw))
}

/// Parse a model reply into a JSON value.
pub fn parse_reply(raw: &str) -> Result<Value, ParseError> {
    let text = normalize_reply(raw);
    if text.is_empty() {
        return Err(ParseError::new("reply is empty", raw));
    }
    serde_json::from_str(text).map_err(|e| ParseError::new(e.to_string(), raw))
}
