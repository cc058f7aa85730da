// src/config/mod.rs
// Central configuration for the orchestrator

pub mod helpers;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

pub use server::{FailMode, PathsConfig, RateLimitConfig, ServerConfig, TimingConfig};

lazy_static! {
    pub static ref CONFIG: OrchestratorConfig = OrchestratorConfig::from_env();
}

/// Composes all domain configs. Loaded once at startup from environment
/// variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub fail_mode: FailMode,
    pub timing: TimingConfig,
    pub paths: PathsConfig,
    pub auth_token: Option<String>,
    pub log_level: String,
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            fail_mode: FailMode::from_env(),
            timing: TimingConfig::from_env(),
            paths: PathsConfig::from_env(),
            auth_token: std::env::var("AUTH_TOKEN").ok(),
            log_level: helpers::env_or("ORCH_LOG_LEVEL", "info"),
        }
    }

    /// Fatal startup validation.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth_token.is_none() && !self.server.is_loopback() {
            anyhow::bail!(
                "AUTH_TOKEN is required when binding to a non-loopback address ({})",
                self.server.host
            );
        }
        std::fs::create_dir_all(&self.paths.data_dir).map_err(|e| {
            anyhow::anyhow!(
                "data directory {:?} is not writable: {}",
                self.paths.data_dir,
                e
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_mode_defaults_closed() {
        std::env::remove_var("FAIL_MODE");
        assert_eq!(FailMode::from_env(), FailMode::Closed);
    }

    #[test]
    fn rate_limit_defaults() {
        std::env::remove_var("RATE_LIMIT_RPM");
        std::env::remove_var("MAX_BODY_BYTES");
        let rl = RateLimitConfig::from_env();
        assert_eq!(rl.requests_per_minute, 120);
        assert_eq!(rl.max_body_bytes, 10 * 1024 * 1024);
    }
}
