//! Response sanitizer and parser: raw model text to an ordered section list.
//!
//! Models are asked for `{"slides": ["...", ...]}` and mostly comply, but
//! the text that comes back still shows a handful of recurring quirks:
//!
//! - the JSON wrapped in ` ```json ... ``` ` fences
//! - a sentence of prose before or after the JSON
//! - literal line breaks inside string literals (invalid JSON)
//! - the whole object encoded a second time as a JSON string
//! - section text that is still escaped (`\n`, `\"`, `\/`) after decoding
//!
//! [`parse`] undoes these in a fixed order. Anything that still does not
//! decode to an object with a `slides` array, or a bare array, of scalar
//! values is a [`SlidesError::MalformedResponse`].

use crate::error::SlidesError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

static RE_INNER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").unwrap());

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+\n").unwrap());

/// Parse raw model text into sanitized sections, in order.
pub fn parse(raw: &str) -> Result<Vec<String>, SlidesError> {
    let text = strip_fences(raw);
    let value = decode(&text).ok_or_else(|| SlidesError::malformed("model text is not JSON", raw))?;
    let items = canonicalize(value, raw)?;

    let sections: Vec<String> = items.iter().map(|s| sanitize_section(s)).collect();
    debug!(
        "Parsed {} sections from {} chars of model text",
        sections.len(),
        raw.len()
    );
    Ok(sections)
}

// ── Step 1: strip code fences ────────────────────────────────────────────────

fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{FEFF}').trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        return caps[1].trim().to_string();
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed.to_string();
    }
    // Fenced block surrounded by prose. A fence inside a section string ends
    // the lazy capture early, so the capture is only used when it decodes.
    if let Some(caps) = RE_INNER_FENCE.captures(trimmed) {
        let inner = caps[1].trim();
        if (inner.starts_with('{') || inner.starts_with('[')) && decode(inner).is_some() {
            return inner.to_string();
        }
    }
    trimmed.to_string()
}

// ── Step 2: decode JSON, leniently ───────────────────────────────────────────

fn decode(text: &str) -> Option<Value> {
    if let Some(v) = first_json_value(text) {
        return Some(v);
    }
    let repaired = escape_raw_controls(text);
    if repaired != text {
        if let Some(v) = first_json_value(&repaired) {
            debug!("Model text decoded after escaping raw control characters");
            return Some(v);
        }
    }
    None
}

/// The first complete JSON object or array in `text`, ignoring leading and
/// trailing prose.
fn first_json_value(text: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Some(v);
    }
    for (idx, _) in text.match_indices(['{', '[']) {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        if let Some(Ok(v)) = stream.next() {
            if v.is_object() || v.is_array() {
                return Some(v);
            }
        }
    }
    None
}

/// Escape line breaks and tabs that appear raw inside JSON string literals.
fn escape_raw_controls(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escape_next = false;

    for ch in text.chars() {
        if escape_next {
            escape_next = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => {
                escape_next = true;
                out.push(ch);
            }
            '"' => {
                in_string = !in_string;
                out.push(ch);
            }
            '\n' if in_string => out.push_str("\\n"),
            '\r' if in_string => out.push_str("\\r"),
            '\t' if in_string => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

// ── Step 3: canonicalize to a list of strings ────────────────────────────────

fn canonicalize(value: Value, raw: &str) -> Result<Vec<String>, SlidesError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("slides") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(SlidesError::malformed("\"slides\" is not an array", raw));
            }
            None => {
                return Err(SlidesError::malformed(
                    "JSON object has no \"slides\" field",
                    raw,
                ));
            }
        },
        // Double-encoded: the JSON arrived as a string literal.
        Value::String(inner) => {
            return match decode(inner.trim()) {
                Some(v @ (Value::Array(_) | Value::Object(_))) => canonicalize(v, raw),
                _ => Err(SlidesError::malformed("model text is a bare string", raw)),
            };
        }
        _ => {
            return Err(SlidesError::malformed(
                "expected {\"slides\": [...]} or an array",
                raw,
            ));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok(String::new()),
            _ => Err(SlidesError::malformed(
                format!("section {} is not text", i + 1),
                raw,
            )),
        })
        .collect()
}

// ── Step 4: sanitize each section ────────────────────────────────────────────

/// Clean one decoded section. Rules run in this order:
/// 1. escaped newline sequences become real line breaks
/// 2. escaped quotes and slashes are unescaped
/// 3. runs of blank lines collapse to one paragraph break
/// 4. outer whitespace is trimmed
///
/// Steps 1 and 2 repeat until nothing changes, so a run like `\\"` ends as
/// a bare quote and sanitizing the output again is a no-op.
fn sanitize_section(section: &str) -> String {
    let mut s = section.to_string();
    loop {
        let next = unescape_once(&s);
        if next == s {
            break;
        }
        s = next;
    }
    let s = RE_BLANK_RUN.replace_all(&s, "\n\n");
    s.trim().to_string()
}

fn unescape_once(s: &str) -> String {
    s.replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\r\n", "\n")
        .replace("\\\"", "\"")
        .replace("\\/", "/")
}
