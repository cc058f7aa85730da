// src/provider/transport.rs
// Transport layer for provider RPC: subprocess (stdio, JSON-RPC framed,
// multiplexed by request id) and HTTP (plain REST, connectionless).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Structured timeout error, distinguishable from an application error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("timeout after {elapsed_ms}ms (limit {limit_ms}ms)")]
pub struct TransportTimeout {
    pub elapsed_ms: u64,
    pub limit_ms: u64,
}

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Send a raw JSON-RPC-ish request and return the raw response body.
    /// Subprocess transports frame this as JSON-RPC; HTTP transports use
    /// it purely for the tools/call POST body.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value>;

    /// GET baseURL/tools/list equivalent (or tools/list JSON-RPC method
    /// for the subprocess transport).
    async fn list_tools(&self) -> Result<Value> {
        self.request("tools/list", None).await
    }

    /// GET baseURL/health equivalent; subprocess transports report
    /// liveness of the child process instead.
    async fn health_check(&self) -> bool;

    /// Run the provider's startup handshake before any `tools/call` is
    /// issued. Subprocess providers must complete `initialize`/
    /// `initialized` here; transports with no handshake concept degrade
    /// to a liveness check.
    async fn initialize(&self) -> Result<()> {
        if self.health_check().await {
            Ok(())
        } else {
            anyhow::bail!("provider failed health check during initialize")
        }
    }

    async fn shutdown(&self) -> Result<()>;
}

/// Ring buffer capturing the last N lines of a provider's stderr, for
/// diagnostics surfaced via `/status`.
pub struct StderrRing {
    lines: parking_lot::Mutex<VecDeque<String>>,
    capacity: usize,
}

impl StderrRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: parking_lot::Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

/// Subprocess transport: newline-delimited JSON-RPC over stdin/stdout,
/// concurrent requests multiplexed by monotonically-increasing id.
pub struct StdioTransport {
    #[allow(dead_code)]
    child: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    next_id: AtomicI64,
    pending: Arc<Mutex<HashMap<i64, oneshot::Sender<JsonRpcResponse>>>>,
    stderr_ring: Arc<StderrRing>,
    timeout: std::time::Duration,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().context("failed to spawn provider process")?;

        let stdin = child.stdin.take().context("failed to get child stdin")?;
        let stdout = child.stdout.take().context("failed to get child stdout")?;
        let stderr_ring = Arc::new(StderrRing::new(200));

        if let Some(stderr) = child.stderr.take() {
            let ring = stderr_ring.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = String::new();
                while let Ok(n) = reader.read_line(&mut line).await {
                    if n == 0 {
                        break;
                    }
                    ring.push(line.trim_end().to_string());
                    line.clear();
                }
            });
        }

        let pending: Arc<Mutex<HashMap<i64, oneshot::Sender<JsonRpcResponse>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                            Ok(response) => {
                                if let Some(id) = response.id {
                                    let mut waiters = reader_pending.lock().await;
                                    if let Some(tx) = waiters.remove(&id) {
                                        let _ = tx.send(response);
                                    }
                                }
                            }
                            Err(e) => warn!("[provider] malformed JSON-RPC line: {}", e),
                        }
                    }
                    Err(e) => {
                        warn!("[provider] stdout read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            next_id: AtomicI64::new(0),
            pending,
            stderr_ring,
            timeout,
        })
    }

    pub fn stderr_tail(&self) -> Vec<String> {
        self.stderr_ring.snapshot()
    }

    async fn write_line(&self, json: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(json.as_bytes()).await.context("failed to write to provider stdin")?;
        stdin.write_all(b"\n").await.context("failed to write newline")?;
        stdin.flush().await.context("failed to flush provider stdin")?;
        Ok(())
    }
}

#[async_trait]
impl ProviderTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let (tx, rx) = oneshot::channel();

        {
            let mut waiters = self.pending.lock().await;
            waiters.insert(id, tx);
        }

        let json = serde_json::to_string(&request)?;
        if let Err(e) = self.write_line(&json).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let start = std::time::Instant::now();
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.error {
                    anyhow::bail!("provider error {}: {}", error.code, error.message);
                }
                response.result.context("empty result from provider")
            }
            Ok(Err(_)) => anyhow::bail!("provider closed connection before responding (id={})", id),
            Err(_) => {
                // Retire the id: a response that arrives after this point
                // is dropped silently since nothing is waiting for it.
                self.pending.lock().await.remove(&id);
                Err(TransportTimeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    limit_ms: self.timeout.as_millis() as u64,
                }
                .into())
            }
        }
    }

    async fn health_check(&self) -> bool {
        let mut child = self.child.lock().await;
        matches!(child.try_wait(), Ok(None))
    }

    async fn initialize(&self) -> Result<()> {
        let params = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "toolbroker", "version": env!("CARGO_PKG_VERSION") },
        });
        self.request("initialize", Some(params))
            .await
            .context("initialize handshake failed")?;

        let notification = JsonRpcRequest::notification("initialized", None);
        let json = serde_json::to_string(&notification)?;
        self.write_line(&json).await.context("failed to send initialized notification")?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        {
            let mut stdin = self.stdin.lock().await;
            let _ = stdin.shutdown().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        let mut child = self.child.lock().await;
        if matches!(child.try_wait(), Ok(None)) {
            let _ = child.start_kill();
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait()).await;
        }
        Ok(())
    }
}

/// HTTP transport: plain REST against `baseURL/tools/list`,
/// `baseURL/tools/call`, `baseURL/health`.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
    timeout: std::time::Duration,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: std::time::Duration, auth_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout,
            auth_token,
        }
    }

    fn apply_auth(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let start = std::time::Instant::now();
        let result = match method {
            "tools/list" => {
                let req = self.apply_auth(self.client.get(format!("{}/tools/list", self.base_url)));
                req.send().await
            }
            "tools/call" => {
                let req = self.apply_auth(self.client.post(format!("{}/tools/call", self.base_url)));
                req.json(&params.unwrap_or(Value::Null)).send().await
            }
            other => anyhow::bail!("unsupported HTTP provider method: {other}"),
        };

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(TransportTimeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    limit_ms: self.timeout.as_millis() as u64,
                }
                .into());
            }
            Err(e) => return Err(e).context("HTTP request to provider failed"),
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP error {}: {}", status, body);
        }

        response.json::<Value>().await.context("failed to parse provider response body")
    }

    async fn health_check(&self) -> bool {
        let req = self.apply_auth(self.client.get(format!("{}/health", self.base_url)));
        matches!(req.send().await, Ok(r) if r.status().is_success())
    }

    async fn shutdown(&self) -> Result<()> {
        debug!("[provider] HTTP transport has no process to shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_transport_strips_trailing_slash() {
        let transport = HttpTransport::new("http://localhost:4000/", std::time::Duration::from_secs(1), None);
        assert_eq!(transport.base_url, "http://localhost:4000");
    }

    #[test]
    fn stderr_ring_evicts_oldest() {
        let ring = StderrRing::new(2);
        ring.push("a".into());
        ring.push("b".into());
        ring.push("c".into());
        assert_eq!(ring.snapshot(), vec!["b".to_string(), "c".to_string()]);
    }
}
