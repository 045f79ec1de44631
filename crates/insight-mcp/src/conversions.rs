//! Conversions between tool payloads and protocol content sequences

use insight_core::InsightError;
use serde_json::{json, Value};

use crate::types::ContentItem;

/// Convert a tool's success payload into a content sequence. String payloads
/// become one text item; anything structured is serialized to JSON text.
pub fn value_to_content(value: Value) -> Vec<ContentItem> {
    let text = match value {
        Value::String(s) => s,
        other => other.to_string(),
    };
    vec![ContentItem::Text { text }]
}

/// Error payload for a call that named no registered tool.
pub fn tool_not_implemented(name: &str) -> Vec<ContentItem> {
    let payload = json!({
        "error": format!("Tool '{name}' not implemented.")
    });
    vec![ContentItem::Text {
        text: payload.to_string(),
    }]
}

/// Error payload for a registered tool that failed during execution. The
/// adapter's own `ToolError` wrapper is unwrapped so the payload carries the
/// capability's message, not a doubled prefix.
pub fn tool_execution_failed(name: &str, error: &InsightError) -> Vec<ContentItem> {
    let message = match error {
        InsightError::ToolError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    let payload = json!({
        "error": format!("Failed to execute tool '{name}': {message}")
    });
    vec![ContentItem::Text {
        text: payload.to_string(),
    }]
}

/// Flatten a remote tool's content sequence back into a single `Value` for
/// the local registry. Text-only results stay plain strings so they survive
/// a round trip through `value_to_content` unchanged.
pub fn flatten_content(items: Vec<ContentItem>) -> Value {
    let mut texts = Vec::new();
    let mut attachments = Vec::new();

    for item in items {
        match item {
            ContentItem::Text { text } => texts.push(text),
            other => attachments.push(serde_json::to_value(other).unwrap_or(Value::Null)),
        }
    }

    if attachments.is_empty() {
        Value::String(texts.join("\n"))
    } else {
        json!({
            "content": texts.join("\n"),
            "attachments": attachments,
        })
    }
}
