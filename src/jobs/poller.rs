// src/jobs/poller.rs
// Job Poller: fires due JobRecords onto the event bus. Mirrors the
// Skill Cron Poller's shape, but the payload execution lives entirely
// outside this process — the core only emits `job/cron.execute`.

use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::bus::{Event, EventBus};

use super::{JobRecord, JobStore, JobType};

const TICK: std::time::Duration = std::time::Duration::from_secs(60);

pub struct JobPoller {
    store: Arc<JobStore>,
    bus: EventBus,
}

impl JobPoller {
    pub fn new(store: Arc<JobStore>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let jobs = match self.store.list_all().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "failed to list jobs from store");
                return;
            }
        };

        let now = Utc::now();
        for mut job in jobs {
            if !job.is_fireable(now) {
                continue;
            }
            let Some(next) = Self::next_run_at(&job) else {
                continue;
            };
            if now < next {
                continue;
            }
            self.fire(&mut job).await;
        }
    }

    /// `None` means the job has no computable next-fire time — a
    /// malformed cron expression, or a recurring job whose creator
    /// never set `next_run_at`.
    fn next_run_at(job: &JobRecord) -> Option<DateTime<Utc>> {
        match job.job_type {
            JobType::Scheduled => job.scheduled_at,
            JobType::Recurring => job.next_run_at,
            JobType::Cron => {
                let expr = job.cron_expression.as_ref()?;
                let schedule = cron::Schedule::from_str(expr).ok()?;
                let tz: chrono_tz::Tz = job.timezone.parse().unwrap_or(chrono_tz::UTC);
                let after = job.last_run_at.unwrap_or(DateTime::<Utc>::MIN_UTC).with_timezone(&tz);
                schedule.after(&after).next().map(|dt| dt.with_timezone(&Utc))
            }
        }
    }

    async fn fire(&self, job: &mut JobRecord) {
        self.bus.publish(Event::CronExecute {
            job_id: job.job_id.clone(),
            action: job.action.to_string(),
        });

        job.run_count += 1;
        job.last_run_at = Some(Utc::now());
        job.next_run_at = match job.job_type {
            JobType::Cron => Self::next_run_at(job),
            // One-shot: never fires again once consumed.
            JobType::Scheduled => {
                job.enabled = false;
                None
            }
            // The creator owns recurrence for this type; clearing forces
            // an explicit re-set rather than refiring every tick.
            JobType::Recurring => None,
        };

        if let Err(e) = self.store.save(job).await {
            warn!(job = %job.job_id, error = %e, "failed to persist job run result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use serde_json::json;

    fn sample_cron(expr: &str) -> JobRecord {
        JobRecord {
            job_id: "j1".into(),
            name: "nightly".into(),
            job_type: JobType::Cron,
            cron_expression: Some(expr.to_string()),
            timezone: "UTC".into(),
            scheduled_at: None,
            action: json!({}),
            enabled: true,
            run_count: 0,
            max_runs: None,
            expires_at: None,
            last_run_at: None,
            next_run_at: None,
        }
    }

    #[test]
    fn cron_job_never_run_has_a_next_fire_time() {
        let job = sample_cron("0 0 * * * *");
        assert!(JobPoller::next_run_at(&job).is_some());
    }

    #[test]
    fn scheduled_job_uses_scheduled_at_verbatim() {
        let at = Utc::now();
        let mut job = sample_cron("0 0 * * * *");
        job.job_type = JobType::Scheduled;
        job.cron_expression = None;
        job.scheduled_at = Some(at);
        assert_eq!(JobPoller::next_run_at(&job), Some(at));
    }

    #[test]
    fn recurring_job_with_no_next_run_at_is_never_due() {
        let mut job = sample_cron("0 0 * * * *");
        job.job_type = JobType::Recurring;
        job.cron_expression = None;
        assert_eq!(JobPoller::next_run_at(&job), None);
    }

    #[tokio::test]
    async fn fire_increments_run_count_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::new(FileStore::new(tmp.path())));
        let job = sample_cron("0 0 * * * *");
        store.save(&job).await.unwrap();

        let poller = JobPoller::new(store.clone(), EventBus::new());
        let mut job = job;
        poller.fire(&mut job).await;

        assert_eq!(job.run_count, 1);
        assert!(job.last_run_at.is_some());

        let persisted = store.get("j1").await.unwrap().unwrap();
        assert_eq!(persisted.run_count, 1);
    }
}
