//! Tool Result Shapes
//!
//! A tool backend may answer in several shapes depending on transport and
//! implementation. `RawToolResult` closes that set into three variants:
//!
//! - `Envelope` - an object with a `content` field holding content blocks
//!   (the `tools/call` result shape of a JSON-RPC tool server)
//! - `Blocks` - a bare sequence of content blocks
//! - `Other` - anything else, treated as a pre-formatted value
//!
//! `RawToolResult` only lives between invocation and normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized result consumed by the reasoning layer.
///
/// Always a parsed JSON-like value; a result that carried no structured
/// payload becomes a `Value::String`.
pub type CanonicalResult = Value;

/// Named arguments passed to a tool handler.
pub type ToolArguments = serde_json::Map<String, Value>;

/// A single content block inside a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    /// `{"type": "text", "text": "..."}`
    Text {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        text: String,
    },
    /// A block that is just a string
    Bare(String),
    /// Any other block (images, resources, numbers)
    Other(Value),
}

impl ContentBlock {
    /// Create a `{"type": "text"}` block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            kind: Some("text".to_string()),
            text: text.into(),
        }
    }

    /// The textual payload of this block.
    ///
    /// Non-text blocks yield their JSON string form.
    pub fn payload(&self) -> String {
        match self {
            ContentBlock::Text { text, .. } => text.clone(),
            ContentBlock::Bare(text) => text.clone(),
            ContentBlock::Other(Value::String(s)) => s.clone(),
            ContentBlock::Other(other) => other.to_string(),
        }
    }
}

/// Result envelope: `{"content": [...], ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultEnvelope {
    pub content: Vec<ContentBlock>,
    /// Set by servers that report tool-level errors inside the envelope
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResultEnvelope {
    /// Envelope with a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }
}

/// Raw value returned by a tool backend, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawToolResult {
    Envelope(ToolResultEnvelope),
    Blocks(Vec<ContentBlock>),
    Other(Value),
}

impl RawToolResult {
    /// Classify a wire-level JSON value into one of the recognized shapes.
    ///
    /// An object whose `content` field is an array is an envelope; a JSON
    /// array is a block sequence; everything else is `Other`.
    pub fn from_wire(value: Value) -> Self {
        match value {
            Value::Object(map) if map.get("content").is_some_and(Value::is_array) => {
                let is_error = map.get("isError").and_then(Value::as_bool).unwrap_or(false);
                let content = match map.get("content") {
                    Some(Value::Array(items)) => items.iter().cloned().map(block_from_value).collect(),
                    _ => Vec::new(),
                };
                RawToolResult::Envelope(ToolResultEnvelope { content, is_error })
            }
            Value::Array(items) => {
                RawToolResult::Blocks(items.into_iter().map(block_from_value).collect())
            }
            other => RawToolResult::Other(other),
        }
    }

    /// Convenience constructor for handlers that produce plain text.
    pub fn text(text: impl Into<String>) -> Self {
        RawToolResult::Envelope(ToolResultEnvelope::text(text))
    }

    /// String form of the whole result, used when no structured payload exists.
    pub fn to_display_string(&self) -> String {
        match self {
            RawToolResult::Envelope(envelope) => {
                serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string())
            }
            RawToolResult::Blocks(blocks) => {
                serde_json::to_string(blocks).unwrap_or_else(|_| "[]".to_string())
            }
            RawToolResult::Other(Value::String(s)) => s.clone(),
            RawToolResult::Other(other) => other.to_string(),
        }
    }
}

impl From<Value> for RawToolResult {
    fn from(value: Value) -> Self {
        RawToolResult::from_wire(value)
    }
}

fn block_from_value(value: Value) -> ContentBlock {
    match value {
        Value::String(s) => ContentBlock::Bare(s),
        Value::Object(ref map) => match map.get("text").and_then(Value::as_str) {
            Some(text) => ContentBlock::Text {
                kind: map.get("type").and_then(Value::as_str).map(str::to_string),
                text: text.to_string(),
            },
            None => ContentBlock::Other(value),
        },
        other => ContentBlock::Other(other),
    }
}
