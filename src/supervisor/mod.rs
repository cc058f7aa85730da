// src/supervisor/mod.rs
// Provider Supervisor: owns provider lifecycle, health probing, and
// bounded automatic restart.

pub mod health;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::provider::{connect, ProviderClient, ProviderDef};

pub use health::{HealthState, ProviderHealth};

const MAX_RESTARTS: u32 = 5;
const RESTART_WINDOW: Duration = Duration::from_secs(10 * 60);
const BASE_BACKOFF: Duration = Duration::from_secs(1);

struct ManagedProvider {
    def: ProviderDef,
    client: RwLock<Option<Arc<ProviderClient>>>,
    health: RwLock<ProviderHealth>,
    restart_timestamps: RwLock<VecDeque<Instant>>,
}

/// Owns every configured provider's client and health state. Shared
/// behind an `Arc` by the Router, the hot-reload watcher, and the
/// background health loop.
pub struct Supervisor {
    providers: RwLock<HashMap<String, Arc<ManagedProvider>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn connect_all(&self, defs: Vec<ProviderDef>) {
        for def in defs {
            self.add_provider(def).await;
        }
    }

    /// Start (or restart) a single provider and register it. Used both
    /// at startup and by the hot-reload watcher when a provider is added.
    pub async fn add_provider(&self, def: ProviderDef) {
        let name = def.name.clone();
        let health = ProviderHealth::new(&name);
        let managed = Arc::new(ManagedProvider {
            def,
            client: RwLock::new(None),
            health: RwLock::new(health),
            restart_timestamps: RwLock::new(VecDeque::new()),
        });

        self.providers.write().await.insert(name.clone(), managed.clone());
        self.start(&managed).await;
    }

    /// Stop and drop a provider. Used by the hot-reload watcher when a
    /// provider is removed from the config file.
    pub async fn remove_provider(&self, name: &str) {
        if let Some(managed) = self.providers.write().await.remove(name) {
            self.stop(&managed).await;
        }
    }

    async fn start(&self, managed: &Arc<ManagedProvider>) {
        match connect(&managed.def).await {
            Ok(client) => match client.initialize().await {
                Ok(()) => {
                    *managed.client.write().await = Some(Arc::new(client));
                    managed.health.write().await.record_success();
                    info!(provider = %managed.def.name, "provider ready");
                }
                Err(e) => {
                    let became_failed = managed.health.write().await.record_failure(e.to_string());
                    warn!(provider = %managed.def.name, error = %e, "provider failed to initialize");
                    if became_failed {
                        self.maybe_restart(managed).await;
                    }
                }
            },
            Err(e) => {
                let became_failed = managed.health.write().await.record_failure(e.to_string());
                warn!(provider = %managed.def.name, error = %e, "provider failed to start");
                if became_failed {
                    self.maybe_restart(managed).await;
                }
            }
        }
    }

    async fn stop(&self, managed: &Arc<ManagedProvider>) {
        if let Some(client) = managed.client.write().await.take() {
            if let Err(e) = client.shutdown().await {
                warn!(provider = %managed.def.name, error = %e, "error shutting down provider");
            }
        }
        managed.health.write().await.mark_stopped();
    }

    /// Exponential backoff restart, capped at `MAX_RESTARTS` within
    /// `RESTART_WINDOW`. Once the cap is hit the
    /// provider stays Failed until an operator intervenes (hot-reload
    /// remove+re-add, or process restart).
    async fn maybe_restart(&self, managed: &Arc<ManagedProvider>) {
        let now = Instant::now();
        let mut timestamps = managed.restart_timestamps.write().await;
        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) > RESTART_WINDOW {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() as u32 >= MAX_RESTARTS {
            warn!(
                provider = %managed.def.name,
                "restart budget exhausted ({} in window), staying failed",
                MAX_RESTARTS
            );
            return;
        }

        let attempt = timestamps.len() as u32;
        timestamps.push_back(now);
        drop(timestamps);

        managed.health.write().await.restart_count += 1;

        let backoff = BASE_BACKOFF * 2u32.pow(attempt.min(6));
        let name = managed.def.name.clone();
        let managed = managed.clone();
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            info!(provider = %name, backoff_ms = backoff.as_millis() as u64, "restarting provider");
            match connect(&managed.def).await {
                Ok(client) => match client.initialize().await {
                    Ok(()) => {
                        *managed.client.write().await = Some(Arc::new(client));
                        managed.health.write().await.record_success();
                    }
                    Err(e) => {
                        warn!(provider = %name, error = %e, "restart attempt failed to initialize");
                    }
                },
                Err(e) => {
                    warn!(provider = %name, error = %e, "restart attempt failed");
                }
            }
        });
    }

    /// Runs forever, probing every registered provider on the configured
    /// interval.
    pub async fn run_health_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let snapshot: Vec<Arc<ManagedProvider>> = self.providers.read().await.values().cloned().collect();
            for managed in snapshot {
                self.probe(&managed).await;
            }
        }
    }

    async fn probe(&self, managed: &Arc<ManagedProvider>) {
        let client = managed.client.read().await.clone();
        let Some(client) = client else { return };

        if client.health_check().await {
            managed.health.write().await.record_success();
            return;
        }

        // Double-probe on failure before declaring unhealthy, to avoid
        // flapping on a single missed beat.
        tokio::time::sleep(Duration::from_millis(250)).await;
        if client.health_check().await {
            managed.health.write().await.record_success();
            return;
        }

        let became_failed = managed.health.write().await.record_failure("health probe failed");
        if became_failed {
            warn!(provider = %managed.def.name, "provider marked failed, restarting");
            self.maybe_restart(managed).await;
        }
    }

    pub async fn get_client(&self, name: &str) -> Option<Arc<ProviderClient>> {
        let managed = self.providers.read().await.get(name)?.clone();
        managed.client.read().await.clone()
    }

    pub async fn list_names(&self) -> Vec<String> {
        self.providers.read().await.keys().cloned().collect()
    }

    pub async fn get_def(&self, name: &str) -> Option<ProviderDef> {
        self.providers.read().await.get(name).map(|m| m.def.clone())
    }

    pub async fn all_health(&self) -> Vec<ProviderHealth> {
        let mut out = Vec::new();
        for managed in self.providers.read().await.values() {
            out.push(managed.health.read().await.clone());
        }
        out
    }

    /// Orderly shutdown of every provider, used on SIGINT/SIGTERM.
    pub async fn shutdown_all(&self) {
        let managed: Vec<Arc<ManagedProvider>> = self.providers.read().await.values().cloned().collect();
        let futures = managed.iter().map(|m| self.stop(m));
        futures::future::join_all(futures).await;
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
