// src/agent/mod.rs
// Agent Supervisor: tracks agent processes, their pause state via the
// Cost Monitor, and forwards skill execution requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::cost::{CostMonitor, CostMonitorConfig, PauseState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Starting,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub base_url: String,
    pub state: AgentState,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub restart_count: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub parent_agent_id: Option<String>,
    pub is_subagent: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecuteSkillRequest {
    pub skill_id: String,
    pub instructions: String,
    #[serde(default)]
    pub execution_plan: Option<Vec<Value>>,
    #[serde(default)]
    pub required_tools: Option<Vec<String>>,
    pub max_steps: u32,
    pub notify_on_completion: bool,
    #[serde(default)]
    pub notify_chat_id: Option<String>,
}

/// Token counts an agent reports for the skill it just ran, fed into
/// that agent's Cost Monitor as soon as the response arrives.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteSkillResponse {
    pub success: bool,
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

struct AgentHandle {
    record: RwLock<AgentRecord>,
    cost_monitor: CostMonitor,
}

pub struct AgentSupervisor {
    agents: RwLock<HashMap<String, Arc<AgentHandle>>>,
    http: reqwest::Client,
}

impl AgentSupervisor {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    pub async fn register(&self, agent_id: impl Into<String>, base_url: impl Into<String>, parent_agent_id: Option<String>) {
        let agent_id = agent_id.into();
        let is_subagent = parent_agent_id.is_some();
        let record = AgentRecord {
            agent_id: agent_id.clone(),
            base_url: base_url.into(),
            state: AgentState::Starting,
            paused: false,
            pause_reason: None,
            restart_count: 0,
            last_activity_at: None,
            parent_agent_id,
            is_subagent,
        };
        let handle = Arc::new(AgentHandle {
            record: RwLock::new(record),
            cost_monitor: CostMonitor::new(CostMonitorConfig::default()),
        });
        self.agents.write().await.insert(agent_id, handle);
    }

    pub async fn record_usage(&self, agent_id: &str, input: u64, output: u64) -> Option<PauseState> {
        let handle = self.agents.read().await.get(agent_id).cloned()?;
        let state = handle.cost_monitor.record_usage(input, output);
        let mut record = handle.record.write().await;
        record.paused = state.paused;
        record.pause_reason = state.reason.clone();
        Some(state)
    }

    pub async fn resume(&self, agent_id: &str, reset: bool) {
        let Some(handle) = self.agents.read().await.get(agent_id).cloned() else {
            return;
        };
        handle.cost_monitor.resume(reset);
        let mut record = handle.record.write().await;
        record.paused = false;
        record.pause_reason = None;
    }

    pub async fn get_record(&self, agent_id: &str) -> Option<AgentRecord> {
        let handle = self.agents.read().await.get(agent_id)?.clone();
        Some(handle.record.read().await.clone())
    }

    pub async fn all_records(&self) -> Vec<AgentRecord> {
        let mut out = Vec::new();
        for handle in self.agents.read().await.values() {
            out.push(handle.record.read().await.clone());
        }
        out
    }

    /// Forwards the skill execution request to the agent's
    /// `/execute-skill` endpoint, short-circuiting if the Cost Monitor
    /// reports the agent paused.
    pub async fn execute_skill(&self, agent_id: &str, request: ExecuteSkillRequest) -> ExecuteSkillResponse {
        let Some(handle) = self.agents.read().await.get(agent_id).cloned() else {
            return ExecuteSkillResponse {
                success: false,
                paused: None,
                reason: Some(format!("unknown agent: {agent_id}")),
                summary: None,
                usage: None,
            };
        };

        {
            let record = handle.record.read().await;
            if record.paused {
                return ExecuteSkillResponse {
                    success: false,
                    paused: Some(true),
                    reason: record.pause_reason.clone(),
                    summary: None,
                    usage: None,
                };
            }
        }

        let base_url = handle.record.read().await.base_url.clone();
        let url = format!("{}/execute-skill", base_url.trim_end_matches('/'));

        let result = self.http.post(&url).json(&request).send().await;
        handle.record.write().await.last_activity_at = Some(Utc::now());

        match result {
            Ok(response) => {
                let mut parsed = response.json::<ExecuteSkillResponse>().await.unwrap_or(ExecuteSkillResponse {
                    success: false,
                    paused: None,
                    reason: Some("malformed agent response".to_string()),
                    summary: None,
                    usage: None,
                });

                if let Some(usage) = parsed.usage.take() {
                    if let Some(state) = self.record_usage(agent_id, usage.input_tokens, usage.output_tokens).await {
                        if state.paused {
                            parsed.paused = Some(true);
                            parsed.reason = state.reason;
                        }
                    }
                }

                parsed
            }
            Err(e) => ExecuteSkillResponse {
                success: false,
                paused: None,
                reason: Some(e.to_string()),
                summary: None,
                usage: None,
            },
        }
    }
}

impl Default for AgentSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_skill_short_circuits_when_paused() {
        let supervisor = AgentSupervisor::new();
        supervisor.register("agent-1", "http://localhost:9999", None).await;
        supervisor.record_usage("agent-1", 1_000_000, 0).await;

        let request = ExecuteSkillRequest {
            skill_id: "s1".into(),
            instructions: "do things".into(),
            execution_plan: None,
            required_tools: None,
            max_steps: 5,
            notify_on_completion: false,
            notify_chat_id: None,
        };

        let response = supervisor.execute_skill("agent-1", request).await;
        assert!(!response.success);
        assert_eq!(response.paused, Some(true));
    }

    #[tokio::test]
    async fn execute_skill_for_unknown_agent_fails_gracefully() {
        let supervisor = AgentSupervisor::new();
        let request = ExecuteSkillRequest {
            skill_id: "s1".into(),
            instructions: "do things".into(),
            execution_plan: None,
            required_tools: None,
            max_steps: 1,
            notify_on_completion: false,
            notify_chat_id: None,
        };
        let response = supervisor.execute_skill("ghost", request).await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn usage_reported_in_execute_skill_response_pauses_future_calls() {
        use axum::routing::post;
        use axum::Json;

        async fn fake_execute_skill() -> Json<ExecuteSkillResponse> {
            Json(ExecuteSkillResponse {
                success: true,
                paused: None,
                reason: None,
                summary: Some("done".to_string()),
                usage: Some(TokenUsage {
                    input_tokens: 1_000_000,
                    output_tokens: 0,
                }),
            })
        }

        let app = axum::Router::new().route("/execute-skill", post(fake_execute_skill));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let supervisor = AgentSupervisor::new();
        supervisor.register("agent-1", format!("http://{addr}"), None).await;

        let request = ExecuteSkillRequest {
            skill_id: "s1".into(),
            instructions: "do things".into(),
            execution_plan: None,
            required_tools: None,
            max_steps: 5,
            notify_on_completion: false,
            notify_chat_id: None,
        };

        let response = supervisor.execute_skill("agent-1", request).await;
        assert!(response.success);
        assert_eq!(response.paused, Some(true));

        let record = supervisor.get_record("agent-1").await.unwrap();
        assert!(record.paused);
    }
}
