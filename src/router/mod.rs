// src/router/mod.rs
// Tool Router: catalog aggregation, namespacing, and the per-call
// routing pipeline.

pub mod hints;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::OrchestratorError;
use crate::provider::protocol::RawToolDef;
use crate::security::SecurityGate;
use crate::supervisor::Supervisor;

/// Tools whose `cronExpression` argument gets a syntax pre-check before
/// dispatch.
const CRON_VALIDATING_TOOLS: &[&str] = &["skill_store_create", "skill_store_update"];
/// Tools whose response gets post-validated for dangling tool references.
const SKILL_STORE_TOOLS: &[&str] = &["skill_store_create", "skill_store_update"];
/// Arguments with free-form text longer than this push a call into the
/// Security Gate's scope even when the tool itself isn't sensitive.
pub const FREE_TEXT_THRESHOLD: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub exposed_name: String,
    pub original_name: String,
    pub provider_name: String,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
    pub annotations: Option<Value>,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub sensitive: bool,
}

#[derive(Clone)]
struct Route {
    provider_name: String,
    original_name: String,
}

/// Immutable, copy-on-rebuild snapshot. Concurrent readers observe
/// either the pre- or post-rebuild snapshot, never a torn state.
struct Catalog {
    defs: Vec<ToolDef>,
    routes: HashMap<String, Route>,
}

impl Catalog {
    fn empty() -> Self {
        Self {
            defs: Vec::new(),
            routes: HashMap::new(),
        }
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.defs.iter().map(|d| d.exposed_name.clone()).collect();
        names.sort();
        names
    }
}

pub struct Router {
    supervisor: Arc<Supervisor>,
    catalog: RwLock<Arc<Catalog>>,
    custom_defs: RwLock<Vec<ToolDef>>,
    security: RwLock<Option<Arc<SecurityGate>>>,
}

impl Router {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self {
            supervisor,
            catalog: RwLock::new(Arc::new(Catalog::empty())),
            custom_defs: RwLock::new(Vec::new()),
            security: RwLock::new(None),
        }
    }

    /// Wires the Security Gate in after construction, since the gate
    /// itself is built from the same Supervisor the Router holds and
    /// the two can't be constructed from each other. Every caller of
    /// `route_tool_call` — the HTTP API, the Skill Dispatcher, the Skill
    /// Poller — goes through this one chokepoint, so this is set once
    /// at startup before any of them run.
    pub async fn set_security_gate(&self, gate: Arc<SecurityGate>) {
        *self.security.write().await = Some(gate);
    }

    /// Register the in-process custom tools (`get_status`, `queue_task`,
    /// etc). These survive provider catalog rebuilds.
    pub async fn register_custom_tools(&self, defs: Vec<ToolDef>) {
        *self.custom_defs.write().await = defs;
        self.rebuild().await;
    }

    /// Pull the live tool list from every connected provider and rebuild
    /// the route table atomically.
    pub async fn rebuild(&self) {
        let mut defs: Vec<ToolDef> = Vec::new();
        let mut routes: HashMap<String, Route> = HashMap::new();

        for tool in self.custom_defs.read().await.iter() {
            routes.insert(
                tool.exposed_name.clone(),
                Route {
                    provider_name: tool.provider_name.clone(),
                    original_name: tool.original_name.clone(),
                },
            );
            defs.push(tool.clone());
        }

        for provider_name in self.supervisor.list_names().await {
            let Some(client) = self.supervisor.get_client(&provider_name).await else {
                continue;
            };
            let Ok(raw_tools) = client.list_tools().await else {
                continue;
            };
            let def = self.supervisor.get_def(&provider_name).await;
            let first_party = def.as_ref().map(|d| d.first_party).unwrap_or(false);
            let sensitive = def.as_ref().map(|d| d.sensitive).unwrap_or(false);
            self.ingest_provider(&provider_name, raw_tools, first_party, sensitive, &mut defs, &mut routes);
        }

        *self.catalog.write().await = Arc::new(Catalog { defs, routes });
    }

    fn ingest_provider(
        &self,
        provider_name: &str,
        raw_tools: Vec<RawToolDef>,
        first_party: bool,
        sensitive: bool,
        defs: &mut Vec<ToolDef>,
        routes: &mut HashMap<String, Route>,
    ) {
        for raw in raw_tools {
            // First-party providers expose their tools under the bare
            // name instead of the prefixed one; only fall back to the
            // prefixed form if the bare name is already taken.
            let exposed_name = if first_party && !routes.contains_key(&raw.name) {
                raw.name.clone()
            } else {
                if first_party {
                    warn!(
                        provider = provider_name,
                        tool = raw.name,
                        "bare tool name collision, exposing under prefixed name instead"
                    );
                }
                format!("{provider_name}_{}", raw.name)
            };

            routes.insert(
                exposed_name.clone(),
                Route {
                    provider_name: provider_name.to_string(),
                    original_name: raw.name.clone(),
                },
            );
            defs.push(ToolDef {
                exposed_name,
                original_name: raw.name.clone(),
                provider_name: provider_name.to_string(),
                description: raw.description,
                input_schema: raw.input_schema,
                annotations: raw.annotations,
                custom: false,
                sensitive,
            });
        }
    }

    pub async fn get_tool_definitions(&self) -> Vec<ToolDef> {
        self.catalog.read().await.defs.clone()
    }

    pub async fn has_route(&self, exposed_name: &str) -> bool {
        self.catalog.read().await.routes.contains_key(exposed_name)
    }

    pub async fn get_tool_def(&self, exposed_name: &str) -> Option<ToolDef> {
        self.catalog
            .read()
            .await
            .defs
            .iter()
            .find(|d| d.exposed_name == exposed_name)
            .cloned()
    }

    /// The single entry point for every inbound tool call.
    pub async fn route_tool_call(&self, exposed_name: &str, args: Value) -> Result<Value, OrchestratorError> {
        let catalog = self.catalog.read().await.clone();

        // 1. resolve route
        let route = match catalog.routes.get(exposed_name) {
            Some(r) => r.clone(),
            None => {
                return Err(OrchestratorError::UnknownTool(format!(
                    "{exposed_name} (available: {})",
                    catalog.names().join(", ")
                )));
            }
        };

        // 2. argument normalization
        let args = Self::normalize_args(args);

        // 3. cron syntax pre-check
        if CRON_VALIDATING_TOOLS.contains(&exposed_name) {
            if let Some(expr) = args.get("cronExpression").and_then(|v| v.as_str()) {
                if expr.parse::<cron::Schedule>().is_err() {
                    return Err(OrchestratorError::Validation(format!(
                        "invalid cron expression: {expr}"
                    )));
                }
            }
        }

        // 4. security scan — sensitive tools and calls carrying long
        // free-form text go through the gate before dispatch, regardless
        // of which caller reached route_tool_call.
        let def = catalog.defs.iter().find(|d| d.exposed_name == exposed_name);
        let sensitive = def.map(|d| d.sensitive).unwrap_or(false);
        if let Some(gate) = self.security.read().await.clone() {
            if sensitive || Self::contains_long_text(&args, FREE_TEXT_THRESHOLD) {
                let content = args.to_string();
                let result = gate.scan(&content, Some(exposed_name)).await;
                if !result.allowed {
                    return Err(OrchestratorError::SecurityBlocked(
                        result.reason.unwrap_or_else(|| format!("risk level {:?}", result.risk)),
                    ));
                }
            }
        }

        // 5. dispatch
        let client = self
            .supervisor
            .get_client(&route.provider_name)
            .await
            .ok_or_else(|| OrchestratorError::ProviderUnavailable(route.provider_name.clone()))?;

        let outcome = client.call_tool(&route.original_name, args).await?;

        if !outcome.success {
            return Err(OrchestratorError::ProviderError(
                outcome.error.unwrap_or_else(|| "provider call failed".to_string()),
            ));
        }

        let mut content = outcome.content.unwrap_or(Value::Null);

        // 6. merge response hints
        if let Some(hint) = hints::lookup(&route.original_name) {
            match &mut content {
                Value::Object(map) => {
                    let mut hint_obj = serde_json::Map::new();
                    hint_obj.insert(
                        "suggest".to_string(),
                        json!(hint.suggest.iter().collect::<Vec<_>>()),
                    );
                    if let Some(tip) = hint.tip {
                        hint_obj.insert("tip".to_string(), json!(tip));
                    }
                    map.insert("_hints".to_string(), Value::Object(hint_obj));
                }
                Value::String(s) => {
                    let footer = match hint.tip {
                        Some(tip) => format!(" [hint: try {} — {}]", hint.suggest.join(", "), tip),
                        None => format!(" [hint: try {}]", hint.suggest.join(", ")),
                    };
                    s.push_str(&footer);
                }
                _ => {}
            }
        }

        // 7. skill-store post-validation, warning-only
        if SKILL_STORE_TOOLS.contains(&exposed_name) {
            if let Some(warning) = self.validate_skill_payload(&content, &catalog).await {
                if let Value::Object(map) = &mut content {
                    map.insert("warning".to_string(), json!(warning));
                }
            }
        }

        Ok(content)
    }

    async fn validate_skill_payload(&self, content: &Value, catalog: &Catalog) -> Option<String> {
        let mut unknown = Vec::new();

        if let Some(required) = content.get("requiredTools").and_then(|v| v.as_array()) {
            for tool in required {
                if let Some(name) = tool.as_str() {
                    if !catalog.routes.contains_key(name) {
                        unknown.push(name.to_string());
                    }
                }
            }
        }

        if let Some(plan) = content.get("executionPlan").and_then(|v| v.as_array()) {
            for step in plan {
                if let Some(name) = step.get("toolName").and_then(|v| v.as_str()) {
                    if !catalog.routes.contains_key(name) && !unknown.iter().any(|u| u == name) {
                        unknown.push(name.to_string());
                    }
                }
            }
        }

        if unknown.is_empty() {
            None
        } else {
            Some(format!("unknown tools referenced: {}", unknown.join(", ")))
        }
    }

    /// Finds free-form text past the threshold anywhere in the argument
    /// tree, so a call carrying a long string is scanned even when the
    /// tool itself isn't marked sensitive.
    fn contains_long_text(value: &Value, threshold: usize) -> bool {
        match value {
            Value::String(s) => s.len() > threshold,
            Value::Array(items) => items.iter().any(|v| Self::contains_long_text(v, threshold)),
            Value::Object(map) => map.values().any(|v| Self::contains_long_text(v, threshold)),
            _ => false,
        }
    }

    fn normalize_args(args: Value) -> Value {
        match args {
            Value::Null => json!({}),
            Value::Object(map) => {
                // Collapse `{arguments: {arguments: {...}}}` double-wrapping.
                if map.len() == 1 {
                    if let Some(Value::Object(inner)) = map.get("arguments").cloned() {
                        return Value::Object(inner);
                    }
                }
                Value::Object(map)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_defaults_null_to_empty_object() {
        assert_eq!(Router::normalize_args(Value::Null), json!({}));
    }

    #[test]
    fn normalize_collapses_double_wrapped_arguments() {
        let wrapped = json!({"arguments": {"arguments": {"x": 1}}});
        assert_eq!(Router::normalize_args(wrapped), json!({"x": 1}));
    }

    #[test]
    fn catalog_names_sorted() {
        let catalog = Catalog {
            defs: vec![
                ToolDef {
                    exposed_name: "b_tool".into(),
                    original_name: "tool".into(),
                    provider_name: "b".into(),
                    description: None,
                    input_schema: None,
                    annotations: None,
                    custom: false,
                    sensitive: false,
                },
                ToolDef {
                    exposed_name: "a_tool".into(),
                    original_name: "tool".into(),
                    provider_name: "a".into(),
                    description: None,
                    input_schema: None,
                    annotations: None,
                    custom: false,
                    sensitive: false,
                },
            ],
            routes: HashMap::new(),
        };
        assert_eq!(catalog.names(), vec!["a_tool".to_string(), "b_tool".to_string()]);
    }
}
