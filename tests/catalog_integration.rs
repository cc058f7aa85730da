// tests/catalog_integration.rs
// End-to-end exercise of provider connect -> catalog rebuild -> routed
// call, against a fake HTTP provider (no real MCP server needed).

use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use serde_json::{json, Value};
use std::sync::Arc;
use toolbroker::provider::{ProviderDef, TransportConfig};
use toolbroker::router::Router;
use toolbroker::supervisor::Supervisor;

async fn fake_health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn fake_tools_list() -> Json<Value> {
    Json(json!({
        "tools": [
            { "name": "search", "description": "search things", "inputSchema": { "type": "object" } }
        ]
    }))
}

async fn fake_tools_call(Json(body): Json<Value>) -> Json<Value> {
    let name = body.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let inner = json!({ "success": true, "data": { "echoed": name } });
    Json(json!({
        "content": [{ "type": "text", "text": serde_json::to_string(&inner).unwrap() }]
    }))
}

async fn spawn_fake_provider() -> String {
    let app = AxumRouter::new()
        .route("/health", get(fake_health))
        .route("/tools/list", get(fake_tools_list))
        .route("/tools/call", post(fake_tools_call));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn provider_tools_are_namespaced_and_routable() {
    let base_url = spawn_fake_provider().await;

    let supervisor = Arc::new(Supervisor::new());
    let router = Arc::new(Router::new(supervisor.clone()));

    supervisor
        .add_provider(ProviderDef {
            name: "demo".to_string(),
            transport: TransportConfig::Http {
                base_url,
                auth_token: None,
            },
            timeout_ms: None,
            required: true,
            sensitive: false,
            first_party: false,
        })
        .await;

    router.rebuild().await;

    let defs = router.get_tool_definitions().await;
    assert!(defs.iter().any(|d| d.exposed_name == "demo_search"));
    assert!(router.has_route("demo_search").await);
    assert!(!router.has_route("search").await);

    let result = router.route_tool_call("demo_search", json!({})).await.unwrap();
    assert_eq!(result.get("success").and_then(|v| v.as_bool()), Some(true));
}

#[tokio::test]
async fn unknown_tool_lists_alternatives() {
    let supervisor = Arc::new(Supervisor::new());
    let router = Router::new(supervisor);
    let err = router.route_tool_call("nonexistent", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), "unknown-tool");
}
