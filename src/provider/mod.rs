// src/provider/mod.rs
// Provider configuration record and client construction.

pub mod client;
pub mod protocol;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use client::ProviderClient;
pub use transport::{HttpTransport, ProviderTransport, StdioTransport};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// How a provider is reached: a locally-spawned subprocess or a remote HTTP
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    Subprocess {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Http {
        base_url: String,
        #[serde(default)]
        auth_token: Option<String>,
    },
}

/// A single entry from the provider config file, as hot-reloaded by the
/// watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDef {
    pub name: String,
    #[serde(flatten)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub required: bool,
    /// Responses from this provider are never logged verbatim and are
    /// always routed through the security gate before returning.
    #[serde(default)]
    pub sensitive: bool,
    /// Curated first-party providers expose tool names unprefixed, in
    /// addition to the always-present namespaced name.
    #[serde(default)]
    pub first_party: bool,
}

impl ProviderDef {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

/// The full provider config file shape: a named list, loaded at startup
/// and re-read on every hot-reload tick.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderFile {
    #[serde(default)]
    pub providers: Vec<ProviderDef>,
}

/// Build a transport + client for one provider definition.
pub async fn connect(def: &ProviderDef) -> anyhow::Result<ProviderClient> {
    let timeout = def.timeout();
    let transport: Box<dyn ProviderTransport> = match &def.transport {
        TransportConfig::Subprocess { command, args, env } => {
            Box::new(StdioTransport::spawn(command, args, env, timeout).await?)
        }
        TransportConfig::Http { base_url, auth_token } => {
            Box::new(HttpTransport::new(base_url, timeout, auth_token.clone()))
        }
    };

    let mut client = ProviderClient::new(def.name.clone(), transport, timeout);
    client.timeout = timeout;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subprocess_provider() {
        let json = r#"{"name":"git","kind":"subprocess","command":"git-mcp","args":["--stdio"],"required":true}"#;
        let def: ProviderDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.name, "git");
        assert!(def.required);
        match def.transport {
            TransportConfig::Subprocess { command, .. } => assert_eq!(command, "git-mcp"),
            _ => panic!("expected subprocess transport"),
        }
    }

    #[test]
    fn parses_http_provider_with_default_timeout() {
        let json = r#"{"name":"search","kind":"http","base_url":"http://localhost:9000"}"#;
        let def: ProviderDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }
}
