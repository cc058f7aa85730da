// src/api/middleware.rs
// Auth-token check and per-client-address rate limiting.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::OrchestratorError;
use crate::state::AppState;

fn is_loopback(addr: IpAddr) -> bool {
    addr.is_loopback()
}

pub async fn auth_layer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, OrchestratorError> {
    let Some(expected) = &state.config.auth_token else {
        // No token configured: only valid when bound to loopback, which
        // startup validation already enforces.
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get("X-Token")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(token) if token == expected => Ok(next.run(request).await),
        _ => Err(OrchestratorError::Validation("missing or invalid X-Token header".to_string())),
    }
}

pub async fn rate_limit_layer(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, OrchestratorError> {
    let ip = addr.ip();
    if is_loopback(ip) {
        return Ok(next.run(request).await);
    }

    match state.limiter.check_key(&ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => Err(OrchestratorError::RateLimited),
    }
}
