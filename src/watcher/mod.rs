// src/watcher/mod.rs
// Hot-Reload Watcher: observes the provider config file and diffs
// changes against the live provider set.

use notify_debouncer_full::notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use crate::provider::{ProviderDef, ProviderFile};
use crate::router::Router;
use crate::supervisor::Supervisor;

const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

pub struct Watcher {
    path: PathBuf,
    supervisor: Arc<Supervisor>,
    router: Arc<Router>,
    current: RwLock<HashSet<String>>,
}

impl Watcher {
    pub fn new(path: PathBuf, supervisor: Arc<Supervisor>, router: Arc<Router>) -> Self {
        Self {
            path,
            supervisor,
            router,
            current: RwLock::new(HashSet::new()),
        }
    }

    /// Load the config file once at startup and connect every provider
    /// it names, without going through the debounced diff path.
    pub async fn load_initial(&self) -> anyhow::Result<()> {
        let defs = match Self::read_defs(&self.path) {
            Ok(defs) => defs,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "no valid provider config at startup, starting with none");
                Vec::new()
            }
        };

        let mut names = HashSet::new();
        for def in defs {
            names.insert(def.name.clone());
            self.supervisor.add_provider(def).await;
        }
        *self.current.write().await = names;
        self.router.rebuild().await;
        Ok(())
    }

    fn read_defs(path: &Path) -> anyhow::Result<Vec<ProviderDef>> {
        let raw = std::fs::read_to_string(path)?;
        let file: ProviderFile = serde_json::from_str(&raw)?;
        Ok(file.providers)
    }

    /// Runs forever, applying debounced filesystem events to the
    /// provider set. Intended to be spawned as a background task.
    pub async fn run(self: Arc<Self>) {
        let (tx, mut rx) = mpsc::channel::<DebounceEventResult>(16);

        let mut debouncer = match new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            let _ = tx.blocking_send(result);
        }) {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "failed to construct config file watcher");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = debouncer.watch(parent, RecursiveMode::NonRecursive) {
                error!(error = %e, path = %parent.display(), "failed to watch config directory");
                return;
            }
        }

        while let Some(result) = rx.recv().await {
            match result {
                Ok(events) => {
                    let touches_config = events.iter().any(|e| e.paths.iter().any(|p| p == &self.path));
                    if touches_config {
                        self.apply_change().await;
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "config watcher error");
                    }
                }
            }
        }
    }

    async fn apply_change(&self) {
        let defs = match Self::read_defs(&self.path) {
            Ok(defs) => defs,
            Err(e) => {
                // Parse errors leave the current set intact. No partial
                // application.
                warn!(path = %self.path.display(), error = %e, "invalid provider config, keeping current set");
                return;
            }
        };

        let new_names: HashSet<String> = defs.iter().map(|d| d.name.clone()).collect();
        let current = self.current.read().await.clone();

        let added: Vec<&ProviderDef> = defs.iter().filter(|d| !current.contains(&d.name)).collect();
        let removed: Vec<String> = current.difference(&new_names).cloned().collect();

        // Internal state updates before callbacks, so the Supervisor and
        // Router observe the post-change view.
        *self.current.write().await = new_names;

        for name in &removed {
            info!(provider = %name, "provider removed by hot-reload");
            self.supervisor.remove_provider(name).await;
        }
        for def in &added {
            info!(provider = %def.name, "provider added by hot-reload");
            self.supervisor.add_provider((*def).clone()).await;
        }

        self.router.rebuild().await;
    }
}
