//! Response Normalizer
//!
//! Converts any `RawToolResult` into the single `CanonicalResult` shape the
//! reasoning layer consumes. Normalization is total: every input maps to
//! exactly one output and nothing here returns an error.
//!
//! Precedence (first match wins):
//! 1. Envelope with a non-empty `content` sequence: parse the first block's text
//! 2. Non-empty bare block sequence: parse the first block's text
//! 3. Anything else (including empty sequences): the result's string form
//!
//! Parsing is lenient (see [`parse_lenient`]); a payload that still does not
//! parse is returned verbatim as a string.

use serde_json::Value;

use crate::result::{CanonicalResult, ContentBlock, RawToolResult};

/// Normalize a raw tool result.
pub fn normalize(raw: &RawToolResult) -> CanonicalResult {
    let first_block = match raw {
        RawToolResult::Envelope(envelope) => envelope.content.first(),
        RawToolResult::Blocks(blocks) => blocks.first(),
        RawToolResult::Other(_) => None,
    };

    match first_block {
        Some(block) => parse_block(block),
        None => Value::String(raw.to_display_string()),
    }
}

fn parse_block(block: &ContentBlock) -> CanonicalResult {
    let payload = block.payload();
    match parse_lenient(&payload) {
        Some(value) => value,
        None => {
            tracing::debug!(
                payload_len = payload.len(),
                "Tool payload is not JSON; passing through as text"
            );
            Value::String(payload)
        }
    }
}

/// Parse a JSON document, tolerating the usual tool-output quirks.
///
/// Strict JSON is tried first. Otherwise, if the text (after stripping a
/// markdown code fence) looks like an object or array, it is repaired with
/// [`repair_json`] and parsed again. Returns `None` if nothing parses.
pub fn parse_lenient(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let candidate = strip_code_fence(trimmed);
    if !(candidate.starts_with('{') || candidate.starts_with('[')) {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }
    serde_json::from_str::<Value>(&repair_json(candidate)).ok()
}

/// Return the body of a leading markdown code fence, or the input unchanged.
fn strip_code_fence(text: &str) -> &str {
    let Some(after_fence) = text.strip_prefix("```") else {
        return text;
    };
    // Skip optional language identifier on the first line
    let body = match after_fence.find('\n') {
        Some(nl) => &after_fence[nl + 1..],
        None => after_fence,
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Rewrite near-JSON into JSON.
///
/// Handles trailing commas, single-quoted strings, bare object keys, raw
/// newlines inside strings, and the Python literals `True`, `False`, `None`.
pub fn repair_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
            }
            ',' => {
                let next = skip_whitespace(&chars, i + 1);
                if !matches!(chars.get(next), Some('}') | Some(']')) {
                    out.push(',');
                }
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let is_key = chars.get(skip_whitespace(&chars, i)) == Some(&':');
                match word.as_str() {
                    _ if is_key => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Copy a string literal starting at `start` as a double-quoted JSON string.
/// Returns the index just past the closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push('"');
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let escaped = chars[i + 1];
            if quote == '\'' && escaped == '\'' {
                out.push('\'');
            } else {
                out.push('\\');
                out.push(escaped);
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return i + 1;
        }
        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }

    // Unterminated literal: close it so the parser can decide
    out.push('"');
    chars.len()
}
