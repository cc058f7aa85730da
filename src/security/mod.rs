// src/security/mod.rs
// Security Gate: consults a security provider's scan_content tool and
// derives a risk level.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::config::FailMode;
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub allowed: bool,
    pub risk: Risk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threats: Option<Vec<String>>,
}

impl ScanResult {
    fn fail(mode: FailMode) -> Self {
        match mode {
            FailMode::Closed => Self {
                allowed: false,
                risk: Risk::High,
                reason: Some("security provider unavailable".to_string()),
                threats: None,
            },
            FailMode::Open => Self {
                allowed: true,
                risk: Risk::None,
                reason: None,
                threats: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScanContentResponse {
    safe: bool,
    confidence: f64,
    #[serde(default)]
    threats: Vec<String>,
}

/// Name of the provider whose `scan_content` tool the gate calls. Fixed
/// by convention, not config, mirroring the curated first-party set in
/// the Router's namespacing rule.
const SECURITY_PROVIDER: &str = "security";

pub struct SecurityGate {
    supervisor: Arc<Supervisor>,
    fail_mode: FailMode,
}

impl SecurityGate {
    pub fn new(supervisor: Arc<Supervisor>, fail_mode: FailMode) -> Self {
        Self { supervisor, fail_mode }
    }

    pub async fn scan(&self, content: &str, source: Option<&str>) -> ScanResult {
        let Some(client) = self.supervisor.get_client(SECURITY_PROVIDER).await else {
            return ScanResult::fail(self.fail_mode);
        };

        let args = json!({ "content": content, "source": source });
        let outcome = match client.call_tool("scan_content", args).await {
            Ok(outcome) => outcome,
            Err(_) => return ScanResult::fail(self.fail_mode),
        };

        if !outcome.success {
            return ScanResult::fail(self.fail_mode);
        }

        let Some(content) = outcome.content else {
            return ScanResult::fail(self.fail_mode);
        };

        let parsed: ScanContentResponse = match serde_json::from_value(content) {
            Ok(p) => p,
            Err(_) => return ScanResult::fail(self.fail_mode),
        };

        Self::derive(parsed)
    }

    fn derive(response: ScanContentResponse) -> ScanResult {
        let risk = if response.safe && response.threats.is_empty() {
            Risk::None
        } else if !response.safe && response.confidence > 0.8 {
            Risk::High
        } else if !response.safe && response.confidence > 0.5 {
            Risk::Medium
        } else if !response.safe {
            Risk::Low
        } else if response.safe && response.confidence < 0.5 {
            Risk::Low
        } else {
            Risk::None
        };

        let allowed = !matches!(risk, Risk::High);
        ScanResult {
            allowed,
            risk,
            reason: None,
            threats: if response.threats.is_empty() {
                None
            } else {
                Some(response.threats)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_with_no_threats_is_none_risk() {
        let r = SecurityGate::derive(ScanContentResponse {
            safe: true,
            confidence: 0.9,
            threats: vec![],
        });
        assert_eq!(r.risk, Risk::None);
        assert!(r.allowed);
    }

    #[test]
    fn unsafe_high_confidence_is_high_risk_and_blocked() {
        let r = SecurityGate::derive(ScanContentResponse {
            safe: false,
            confidence: 0.95,
            threats: vec!["prompt-injection".to_string()],
        });
        assert_eq!(r.risk, Risk::High);
        assert!(!r.allowed);
    }

    #[test]
    fn unsafe_medium_confidence_is_medium_risk() {
        let r = SecurityGate::derive(ScanContentResponse {
            safe: false,
            confidence: 0.6,
            threats: vec![],
        });
        assert_eq!(r.risk, Risk::Medium);
        assert!(r.allowed);
    }

    #[test]
    fn unsafe_low_confidence_is_low_risk() {
        let r = SecurityGate::derive(ScanContentResponse {
            safe: false,
            confidence: 0.2,
            threats: vec![],
        });
        assert_eq!(r.risk, Risk::Low);
    }

    #[test]
    fn safe_low_confidence_is_low_risk() {
        let r = SecurityGate::derive(ScanContentResponse {
            safe: true,
            confidence: 0.3,
            threats: vec![],
        });
        assert_eq!(r.risk, Risk::Low);
    }

    #[test]
    fn fail_closed_blocks() {
        let r = ScanResult::fail(FailMode::Closed);
        assert!(!r.allowed);
        assert_eq!(r.risk, Risk::High);
    }

    #[test]
    fn fail_open_allows() {
        let r = ScanResult::fail(FailMode::Open);
        assert!(r.allowed);
        assert_eq!(r.risk, Risk::None);
    }
}
