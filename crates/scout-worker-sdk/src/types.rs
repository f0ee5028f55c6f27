//! Type definitions for worker stdout events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level event read from a worker's stdout, one JSON object per line.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// A complete conversation message.
    #[serde(alias = "message_end")]
    Message { message: AgentMessage },

    /// A tool finished and returned output to the worker.
    #[serde(alias = "tool_execution_end")]
    ToolResult {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default, alias = "isError")]
        is_error: Option<bool>,
    },

    /// Any other event type (fallback).
    #[serde(untagged)]
    Unknown(Value),
}

impl WorkerMessage {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "Message",
            Self::ToolResult { .. } => "ToolResult",
            Self::Unknown(_) => "Unknown",
        }
    }
}

/// A message authored by the worker's agent or echoed back to it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentMessage {
    pub role: String,
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

impl AgentMessage {
    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

/// Content item in a message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Text content.
    Text { text: String },

    /// Tool invocation.
    #[serde(alias = "toolCall", alias = "tool_use")]
    ToolCall {
        name: String,
        #[serde(default, alias = "input")]
        arguments: Value,
    },

    /// Thinking blocks, images and anything else.
    #[serde(other)]
    Other,
}

/// Render a tool-result payload as plain text.
///
/// Strings pass through, arrays of `{"type":"text","text":..}` blocks are joined
/// with newlines, and anything else is compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => value_to_text(item),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => match map.get("text").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => match map.get("content") {
                Some(inner) => value_to_text(inner),
                None => value.to_string(),
            },
        },
        other => other.to_string(),
    }
}

/// Text carried by a tool-result event, whichever field it arrived in.
pub fn tool_result_text(text: Option<&str>, content: Option<&Value>, result: Option<&Value>) -> String {
    if let Some(text) = text {
        return text.to_string();
    }
    content
        .or(result)
        .map(value_to_text)
        .unwrap_or_default()
}

/// Lifecycle transitions of a worker process, reported to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The process started.
    Spawned { pid: Option<u32> },
    /// Cancellation was requested and a graceful terminate was sent.
    TerminateRequested,
    /// The grace period elapsed and the process was force-killed.
    ForceKilled,
    /// The process exited. `code` is `None` when it died from a signal.
    Exited { code: Option<i32> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_message_parsing() {
        let json = r#"{"type":"message","message":{"role":"assistant","content":[{"type":"tool_call","name":"web_search","arguments":{"q":"rust"}},{"type":"text","text":"Hello"}]}}"#;
        let msg: WorkerMessage = serde_json::from_str(json).unwrap();

        if let WorkerMessage::Message { message } = msg {
            assert!(message.is_assistant());
            assert_eq!(message.content.len(), 2);
            match &message.content[0] {
                ContentItem::ToolCall { name, arguments } => {
                    assert_eq!(name, "web_search");
                    assert_eq!(arguments["q"], "rust");
                }
                other => panic!("Expected tool call, got {:?}", other),
            }
            assert!(matches!(&message.content[1], ContentItem::Text { text } if text == "Hello"));
        } else {
            panic!("Expected message");
        }
    }

    #[test]
    fn test_aliases() {
        let json = r#"{"type":"message_end","message":{"role":"assistant","content":[{"type":"toolCall","name":"read","arguments":{}},{"type":"thinking","thinking":"hmm"}]}}"#;
        let msg: WorkerMessage = serde_json::from_str(json).unwrap();
        if let WorkerMessage::Message { message } = msg {
            assert!(matches!(message.content[0], ContentItem::ToolCall { .. }));
            assert!(matches!(message.content[1], ContentItem::Other));
        } else {
            panic!("Expected message");
        }

        let json = r#"{"type":"tool_execution_end","result":{"content":[{"type":"text","text":"42"}]}}"#;
        let msg: WorkerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind(), "ToolResult");
    }

    #[test]
    fn test_unknown_event_falls_back() {
        let msg: WorkerMessage = serde_json::from_str(r#"{"type":"agent_start","x":1}"#).unwrap();
        assert!(matches!(msg, WorkerMessage::Unknown(_)));
    }

    #[test]
    fn test_tool_result_text() {
        assert_eq!(tool_result_text(Some("plain"), None, None), "plain");
        assert_eq!(
            tool_result_text(None, Some(&json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}])), None),
            "a\nb"
        );
        assert_eq!(
            tool_result_text(None, None, Some(&json!({"content": [{"type": "text", "text": "42"}]}))),
            "42"
        );
        assert_eq!(tool_result_text(None, None, Some(&json!({"ok": true}))), r#"{"ok":true}"#);
        assert_eq!(tool_result_text(None, None, None), "");
    }
}
