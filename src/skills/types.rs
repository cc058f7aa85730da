// src/skills/types.rs
// Skill record shape, owned by the memory provider and mirrored
// read-only in core during dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Cron,
    Manual,
    Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub interval_minutes: Option<u32>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub id: String,
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub agent_id: String,
    pub name: String,
    pub enabled: bool,
    pub trigger_type: TriggerType,
    pub trigger_config: TriggerConfig,
    pub instructions: String,
    #[serde(default)]
    pub required_tools: Option<Vec<String>>,
    #[serde(default)]
    pub execution_plan: Option<Vec<ExecutionStep>>,
    pub max_steps: u32,
    pub notify_on_completion: bool,
    #[serde(default)]
    pub notify_interval_minutes: Option<u32>,
    #[serde(default)]
    pub last_run_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub last_run_status: Option<String>,
    #[serde(default)]
    pub last_run_summary: Option<String>,
    #[serde(default)]
    pub last_notified_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Skill {
    /// A skill has `executionPlan` ⇒ direct-tier; otherwise agent-tier.
    pub fn is_direct_tier(&self) -> bool {
        matches!(&self.execution_plan, Some(plan) if !plan.is_empty())
    }
}
