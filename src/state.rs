// src/state.rs
// AppState composes every long-lived service behind Arc handles,
// avoiding a cyclic-reference trap: the Router is constructed first
// with no providers, then the Supervisor publishes clients into it.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::agent::AgentSupervisor;
use crate::bus::EventBus;
use crate::config::OrchestratorConfig;
use crate::cost::{CostMonitor, CostMonitorConfig};
use crate::jobs::{JobPoller, JobStore};
use crate::router::Router;
use crate::security::SecurityGate;
use crate::skills::{Dispatcher, SkillPoller};
use crate::store::FileStore;
use crate::supervisor::Supervisor;
use crate::tasks::TaskQueue;

/// Sliding-window rate limiter keyed by client address.
pub type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

fn build_limiter(requests_per_minute: u32) -> Arc<KeyedLimiter> {
    let per_minute = NonZeroU32::new(requests_per_minute.max(1)).unwrap();
    Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute)))
}

pub struct AppState {
    pub config: OrchestratorConfig,
    pub supervisor: Arc<Supervisor>,
    pub router: Arc<Router>,
    pub security: Arc<SecurityGate>,
    pub agents: Arc<AgentSupervisor>,
    pub dispatcher: Arc<Dispatcher>,
    pub poller: Arc<SkillPoller>,
    pub tasks: Arc<TaskQueue>,
    pub jobs: Arc<JobStore>,
    pub job_poller: Arc<JobPoller>,
    pub cost: Arc<CostMonitor>,
    pub bus: EventBus,
    pub limiter: Arc<KeyedLimiter>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Async because wiring the Security Gate into the Router requires
    /// an await on the Router's internal lock.
    pub async fn new(config: OrchestratorConfig) -> Self {
        let supervisor = Arc::new(Supervisor::new());
        let router = Arc::new(Router::new(supervisor.clone()));
        let security = Arc::new(SecurityGate::new(supervisor.clone(), config.fail_mode));
        router.set_security_gate(security.clone()).await;
        let agents = Arc::new(AgentSupervisor::new());
        let dispatcher = Arc::new(Dispatcher::new(router.clone(), agents.clone()));
        let poller_interval = std::time::Duration::from_millis(config.timing.poller_interval_ms);
        let poller = Arc::new(SkillPoller::new(router.clone(), dispatcher.clone(), poller_interval));

        let bus = EventBus::new();
        let tasks = Arc::new(TaskQueue::new(FileStore::new(config.paths.task_dir()), bus.clone()));
        let jobs = Arc::new(JobStore::new(FileStore::new(config.paths.job_dir())));
        let job_poller = Arc::new(JobPoller::new(jobs.clone(), bus.clone()));
        let cost = Arc::new(CostMonitor::new(CostMonitorConfig::default()));
        let limiter = build_limiter(config.rate_limit.requests_per_minute);

        Self {
            config,
            supervisor,
            router,
            security,
            agents,
            dispatcher,
            poller,
            tasks,
            jobs,
            job_poller,
            cost,
            bus,
            limiter,
            started_at: chrono::Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        chrono::Utc::now().signed_duration_since(self.started_at).num_seconds()
    }
}
