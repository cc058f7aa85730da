// src/skills/dispatcher.rs
// Skill Dispatcher: tier selection and completion notification.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::agent::{AgentSupervisor, ExecuteSkillRequest};
use crate::router::Router;

use super::types::Skill;

const MESSAGING_PROVIDER_TOOL: &str = "messaging_send_message";

pub struct DispatchOutcome {
    pub status: &'static str,
    pub summary: String,
}

pub struct Dispatcher {
    router: Arc<Router>,
    agents: Arc<AgentSupervisor>,
}

impl Dispatcher {
    pub fn new(router: Arc<Router>, agents: Arc<AgentSupervisor>) -> Self {
        Self { router, agents }
    }

    pub async fn dispatch(&self, skill: &mut Skill) -> DispatchOutcome {
        let outcome = if skill.is_direct_tier() {
            self.run_direct_tier(skill).await
        } else {
            self.run_agent_tier(skill).await
        };

        skill.last_run_at = Some(Utc::now());
        skill.last_run_status = Some(outcome.status.to_string());
        skill.last_run_summary = Some(outcome.summary.clone());

        if skill.notify_on_completion && self.should_notify(skill) {
            self.notify(skill, &outcome).await;
            skill.last_notified_at = Some(Utc::now());
        }

        outcome
    }

    async fn run_direct_tier(&self, skill: &Skill) -> DispatchOutcome {
        let plan = skill.execution_plan.as_ref().expect("direct tier implies a plan");

        for step in plan {
            match self.router.route_tool_call(&step.tool_name, step.parameters.clone()).await {
                Ok(_) => continue,
                Err(e) => {
                    return DispatchOutcome {
                        status: "error",
                        summary: format!("Direct execution — {}: {}", step.id, e),
                    };
                }
            }
        }

        DispatchOutcome {
            status: "success",
            summary: "Direct execution completed all steps".to_string(),
        }
    }

    async fn run_agent_tier(&self, skill: &Skill) -> DispatchOutcome {
        let request = ExecuteSkillRequest {
            skill_id: skill.id.clone(),
            instructions: skill.instructions.clone(),
            execution_plan: None,
            required_tools: skill.required_tools.clone(),
            max_steps: skill.max_steps,
            notify_on_completion: skill.notify_on_completion,
            notify_chat_id: None,
        };

        let response = self.agents.execute_skill(&skill.agent_id, request).await;
        DispatchOutcome {
            status: if response.success { "success" } else { "error" },
            summary: response.summary.unwrap_or_else(|| {
                response.reason.unwrap_or_else(|| "agent returned no summary".to_string())
            }),
        }
    }

    fn should_notify(&self, skill: &Skill) -> bool {
        match (skill.notify_interval_minutes, skill.last_notified_at) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(minutes), Some(last)) => {
                Utc::now().signed_duration_since(last) >= ChronoDuration::minutes(minutes as i64)
            }
        }
    }

    async fn notify(&self, skill: &Skill, outcome: &DispatchOutcome) {
        let excerpt: String = outcome.summary.chars().take(200).collect();
        let text = format!("skill \"{}\" {}: {}", skill.name, outcome.status, excerpt);
        let args = json!({ "text": text });

        if let Err(e) = self.router.route_tool_call(MESSAGING_PROVIDER_TOOL, args).await {
            warn!(skill = %skill.id, error = %e, "failed to send skill completion notification");
        }
    }
}
