// src/provider/client.rs
// Provider Client: wraps a transport with the timeout/unwrap/classify
// behavior shared by both subprocess and HTTP providers.

use serde_json::Value;
use std::time::Duration;

use crate::error::OrchestratorError;

use super::protocol::{unwrap_content, RawToolDef, ToolCallOutcome};
use super::transport::{ProviderTransport, TransportTimeout};

pub struct ProviderClient {
    pub name: String,
    transport: Box<dyn ProviderTransport>,
    pub timeout: Duration,
}

impl ProviderClient {
    pub fn new(name: impl Into<String>, transport: Box<dyn ProviderTransport>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            transport,
            timeout,
        }
    }

    pub async fn list_tools(&self) -> Result<Vec<RawToolDef>, OrchestratorError> {
        let raw = self
            .transport
            .list_tools()
            .await
            .map_err(|e| self.classify(e))?;

        let tools = raw
            .get("tools")
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default();

        tools
            .into_iter()
            .map(|t| serde_json::from_value(t).map_err(|e| OrchestratorError::ProviderError(e.to_string())))
            .collect()
    }

    /// Invoke a tool and unwrap its MCP-style response envelope. Malformed
    /// envelopes degrade to the raw value rather than erroring.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<ToolCallOutcome, OrchestratorError> {
        let params = serde_json::json!({ "name": name, "arguments": args });
        let raw = self
            .transport
            .request("tools/call", Some(params))
            .await
            .map_err(|e| self.classify(e))?;

        if let Some(is_error) = raw.get("isError").and_then(|v| v.as_bool()) {
            if is_error {
                let message = unwrap_content(&raw)
                    .map(|v| match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "provider reported an error".to_string());
                return Ok(ToolCallOutcome::err(message));
            }
        }

        match unwrap_content(&raw) {
            Some(content) => Ok(ToolCallOutcome::ok(content)),
            None => Ok(ToolCallOutcome::ok(raw)),
        }
    }

    pub async fn health_check(&self) -> bool {
        self.transport.health_check().await
    }

    /// Run the provider's startup handshake. Must succeed before any
    /// `tools/call` is issued against this client.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        self.transport.initialize().await
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.transport.shutdown().await
    }

    /// Map a transport-level failure into the exact kind the rest of the
    /// system reasons about: timeouts are structurally distinct from
    /// application errors.
    fn classify(&self, err: anyhow::Error) -> OrchestratorError {
        if let Some(timeout) = err.downcast_ref::<TransportTimeout>() {
            return OrchestratorError::ProviderTimeout {
                elapsed_ms: timeout.elapsed_ms,
                limit_ms: timeout.limit_ms,
            };
        }
        OrchestratorError::ProviderError(err.to_string())
    }
}
