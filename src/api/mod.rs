// src/api/mod.rs
// Public API route construction.

pub mod http;
pub mod middleware;

use axum::extract::DefaultBodyLimit;
use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use axum::Router as AxumRouter;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    let protected = AxumRouter::new()
        .route("/tools/list", get(http::tools_list))
        .route("/tools/call", post(http::tools_call))
        .route("/status", get(http::status))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), middleware::rate_limit_layer))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), middleware::auth_layer));

    AxumRouter::new()
        .route("/health", get(http::health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.rate_limit.max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
