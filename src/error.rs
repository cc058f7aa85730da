// src/error.rs
// Canonical error kinds and the {success, data?, error?} envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// Every API boundary maps into this before being serialized into the
/// canonical envelope.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrchestratorError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("provider timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
    ProviderTimeout { elapsed_ms: u64, limit_ms: u64 },
    #[error("provider error: {0}")]
    ProviderError(String),
    #[error("security blocked: {0}")]
    SecurityBlocked(String),
    #[error("agent paused: {0}")]
    CostPaused(String),
    #[error("rate limited")]
    RateLimited,
    #[error("request body too large")]
    BodyTooLarge,
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownTool(_) => "unknown-tool",
            Self::ProviderUnavailable(_) => "provider-unavailable",
            Self::ProviderTimeout { .. } => "provider-timeout",
            Self::ProviderError(_) => "provider-error",
            Self::SecurityBlocked(_) => "security-blocked",
            Self::CostPaused(_) => "cost-paused",
            Self::RateLimited => "rate-limited",
            Self::BodyTooLarge => "body-too-large",
            Self::Internal(_) => "internal",
        }
    }

    fn http_status(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            // Every other error travels inside the MCP envelope with
            // isError:true, never as a raw HTTP 500.
            _ => StatusCode::OK,
        }
    }
}

/// The universal `{success, data?, error?}` response shape.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Envelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            blocked: None,
            paused: None,
            reason: None,
        }
    }

    pub fn err(error: &OrchestratorError) -> Self {
        let mut env = Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            blocked: None,
            paused: None,
            reason: None,
        };
        match error {
            OrchestratorError::SecurityBlocked(reason) => {
                env.blocked = Some(true);
                env.reason = Some(reason.clone());
            }
            OrchestratorError::CostPaused(reason) => {
                env.paused = Some(true);
                env.reason = Some(reason.clone());
            }
            _ => {}
        }
        env
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        (status, Json(Envelope::err(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_blocked_sets_blocked_flag() {
        let err = OrchestratorError::SecurityBlocked("threat detected".into());
        let env = Envelope::err(&err);
        assert_eq!(env.success, false);
        assert_eq!(env.blocked, Some(true));
    }

    #[test]
    fn cost_paused_sets_paused_flag() {
        let err = OrchestratorError::CostPaused("Hard cap exceeded: 11000".into());
        let env = Envelope::err(&err);
        assert_eq!(env.paused, Some(true));
        assert_eq!(env.reason, Some("Hard cap exceeded: 11000".to_string()));
    }
}
