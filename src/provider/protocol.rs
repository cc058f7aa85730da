// src/provider/protocol.rs
// JSON-RPC 2.0 framing used by the subprocess transport, and the tool
// schema/result shapes shared by both transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: i64, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.to_string(),
            params,
        }
    }

    pub fn notification(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// A tool definition as returned raw by a provider's `tools/list`, before
/// the Router applies namespacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawToolDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
    #[serde(default)]
    pub annotations: Option<Value>,
}

/// The outcome of a `tools/call`, after response unwrapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallOutcome {
    pub fn ok(content: Value) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error.into()),
        }
    }
}

/// Peel the MCP-style `{content: [{type:"text", text: "<json>"}]}` wrapper
/// (possibly nested once), returning the unwrapped inner value. Returns
/// `None` on malformed structure rather than erroring — callers see a
/// transport-level success with opaque content in that case.
pub fn unwrap_content(raw: &Value) -> Option<Value> {
    let content = raw.get("content")?.as_array()?;
    let first = content.first()?;
    let text = first.get("text")?.as_str()?;

    // One layer of unwrapping always happens; a second layer only if the
    // text itself decodes to another `{content:[...]}` envelope.
    match serde_json::from_str::<Value>(text) {
        Ok(inner) => {
            if let Some(nested) = inner.get("content").and_then(|c| c.as_array()) {
                if let Some(nested_text) = nested.first().and_then(|c| c.get("text")).and_then(|t| t.as_str()) {
                    return Some(
                        serde_json::from_str::<Value>(nested_text).unwrap_or(Value::String(nested_text.to_string())),
                    );
                }
            }
            Some(inner)
        }
        Err(_) => Some(Value::String(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_single_layer() {
        let raw = json!({"content": [{"type": "text", "text": "{\"ok\":true}"}]});
        let unwrapped = unwrap_content(&raw).unwrap();
        assert_eq!(unwrapped, json!({"ok": true}));
    }

    #[test]
    fn unwraps_double_layer() {
        let inner_text = serde_json::to_string(&json!({"content":[{"type":"text","text":"{\"ok\":true}"}]})).unwrap();
        let raw = json!({"content": [{"type": "text", "text": inner_text}]});
        let unwrapped = unwrap_content(&raw).unwrap();
        assert_eq!(unwrapped, json!({"ok": true}));
    }

    #[test]
    fn malformed_returns_none() {
        let raw = json!({"nope": true});
        assert!(unwrap_content(&raw).is_none());
    }

    #[test]
    fn non_json_text_passes_through_as_string() {
        let raw = json!({"content": [{"type": "text", "text": "plain text"}]});
        let unwrapped = unwrap_content(&raw).unwrap();
        assert_eq!(unwrapped, json!("plain text"));
    }
}
