// src/api/http.rs
// Public API handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::bus::Event;
use crate::state::AppState;

const CUSTOM_TOOLS: &[&str] = &[
    "get_status",
    "queue_task",
    "get_job_status",
    "spawn_subagent",
    "get_tool_catalog",
    "trigger_backfill",
];

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "status": "ok", "uptimeSeconds": state.uptime_seconds() }))
}

pub async fn tools_list(State(state): State<Arc<AppState>>) -> Json<Value> {
    let defs = state.router.get_tool_definitions().await;
    let health = state.supervisor.all_health().await;
    Json(json!({
        "tools": defs,
        "mcpMetadata": { "providerHealth": health },
    }))
}

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Wraps a result into the MCP-style outer envelope. The inner document
/// is always the canonical `{success, data?, error?}` shape.
fn mcp_envelope(inner: Value, is_error: bool) -> Json<Value> {
    let text = serde_json::to_string(&inner).unwrap_or_else(|_| "{}".to_string());
    let mut body = json!({ "content": [{ "type": "text", "text": text }] });
    if is_error {
        body["isError"] = json!(true);
    }
    Json(body)
}

pub async fn tools_call(State(state): State<Arc<AppState>>, Json(request): Json<ToolCallRequest>) -> Json<Value> {
    if CUSTOM_TOOLS.contains(&request.name.as_str()) {
        return match dispatch_custom(&state, &request.name, request.arguments).await {
            Ok(data) => mcp_envelope(json!({ "success": true, "data": data }), false),
            Err(e) => mcp_envelope(json!({ "success": false, "error": e.to_string() }), true),
        };
    }

    // Security scanning happens inside route_tool_call itself, so every
    // caller (this handler, the Skill Dispatcher, the Skill Poller) is
    // covered the same way.
    match state.router.route_tool_call(&request.name, request.arguments).await {
        Ok(data) => mcp_envelope(json!({ "success": true, "data": data }), false),
        Err(e) => {
            let blocked = matches!(e.kind(), "security-blocked");
            let mut body = json!({ "success": false, "error": e.to_string() });
            if blocked {
                body["blocked"] = json!(true);
            }
            mcp_envelope(body, true)
        }
    }
}

async fn dispatch_custom(state: &AppState, name: &str, args: Value) -> anyhow::Result<Value> {
    match name {
        "get_status" => Ok(status_snapshot(state).await),
        "get_tool_catalog" => {
            let defs = state.router.get_tool_definitions().await;
            Ok(json!({ "tools": defs }))
        }
        "queue_task" => {
            #[derive(Deserialize)]
            struct Args {
                name: String,
                action: Value,
            }
            let parsed: Args = serde_json::from_value(args)?;
            let outcome = state.tasks.queue_task(&parsed.name, parsed.action).await?;
            Ok(serde_json::to_value(outcome)?)
        }
        "get_job_status" => {
            #[derive(Deserialize)]
            struct Args {
                task_id: String,
            }
            let parsed: Args = serde_json::from_value(args)?;
            let record = state.tasks.get_job_status(&parsed.task_id).await?;
            Ok(serde_json::to_value(record)?)
        }
        "spawn_subagent" => {
            #[derive(Deserialize)]
            struct Args {
                base_url: String,
                parent_agent_id: Option<String>,
            }
            let parsed: Args = serde_json::from_value(args)?;
            let agent_id = Uuid::new_v4().to_string();
            state
                .agents
                .register(agent_id.clone(), parsed.base_url, parsed.parent_agent_id)
                .await;
            Ok(json!({ "agentId": agent_id }))
        }
        "trigger_backfill" => {
            #[derive(Deserialize, Serialize)]
            struct Args {
                #[serde(default)]
                action: Value,
            }
            let parsed: Args = serde_json::from_value(args).unwrap_or(Args { action: json!({}) });
            let task_id = Uuid::new_v4().to_string();
            state.bus.publish(Event::BackfillStart {
                task_id: task_id.clone(),
                action: parsed.action.to_string(),
            });
            Ok(json!({ "taskId": task_id, "status": "queued" }))
        }
        other => anyhow::bail!("unhandled custom tool: {other}"),
    }
}

async fn status_snapshot(state: &AppState) -> Value {
    json!({
        "uptimeSeconds": state.uptime_seconds(),
        "providers": state.supervisor.all_health().await,
        "agents": state.agents.all_records().await,
        "security": { "failMode": format!("{:?}", state.config.fail_mode) },
        "toolCount": state.router.get_tool_definitions().await.len(),
    })
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(status_snapshot(&state).await)
}
