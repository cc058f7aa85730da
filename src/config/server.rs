// src/config/server.rs
// Server, security-gate, and rate-limit configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::helpers::{env_or, env_u32, env_u64, env_usize};

/// HTTP bind configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("ORCH_HOST", "127.0.0.1"),
            port: env_u32("ORCH_PORT", 8787) as u16,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_loopback(&self) -> bool {
        matches!(self.host.as_str(), "127.0.0.1" | "localhost" | "::1")
    }
}

/// Sliding-window rate limit applied to the Public API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub max_body_bytes: usize,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self {
            requests_per_minute: env_u32("RATE_LIMIT_RPM", 120),
            max_body_bytes: env_usize("MAX_BODY_BYTES", 10 * 1024 * 1024),
        }
    }
}

/// Fail-open vs. fail-closed policy for the Security Gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailMode {
    Open,
    Closed,
}

impl FailMode {
    pub fn from_env() -> Self {
        match env_or("FAIL_MODE", "closed").as_str() {
            "open" => FailMode::Open,
            _ => FailMode::Closed,
        }
    }
}

/// Polling and health-check intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub poller_interval_ms: u64,
    pub provider_health_interval_ms: u64,
}

impl TimingConfig {
    pub fn from_env() -> Self {
        Self {
            poller_interval_ms: env_u64("POLLER_INTERVAL_MS", 60_000),
            provider_health_interval_ms: env_u64("PROVIDER_HEALTH_INTERVAL_MS", 30_000),
        }
    }
}

/// Storage roots and the hot-reloaded provider config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub provider_config_path: PathBuf,
}

fn default_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".toolbroker"),
        None => PathBuf::from("./data"),
    }
}

impl PathsConfig {
    pub fn from_env() -> Self {
        let data_dir = match std::env::var("DATA_DIR") {
            Ok(v) => PathBuf::from(v),
            Err(_) => default_data_dir(),
        };
        Self {
            log_dir: PathBuf::from(env_or("LOG_DIR", "./logs")),
            provider_config_path: PathBuf::from(env_or(
                "ORCH_PROVIDER_CONFIG",
                data_dir.join("providers.json").to_string_lossy().as_ref(),
            )),
            data_dir,
        }
    }

    pub fn task_dir(&self) -> PathBuf {
        self.data_dir.join("tasks")
    }

    pub fn job_dir(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }
}
