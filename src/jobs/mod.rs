// src/jobs/mod.rs
// Job records: persistent cron/scheduled/recurring entries, distinct
// from the memory-provider-owned Skill record.

pub mod poller;

pub use poller::JobPoller;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::FileStore;

const DEDUP_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Cron,
    Scheduled,
    Recurring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default)]
    pub cron_expression: Option<String>,
    pub timezone: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub action: serde_json::Value,
    pub enabled: bool,
    pub run_count: u32,
    #[serde(default)]
    pub max_runs: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Disabled, expired, or exhausted jobs are never fired.
    pub fn is_fireable(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(expires_at) = self.expires_at {
            if now >= expires_at {
                return false;
            }
        }
        if let Some(max_runs) = self.max_runs {
            if self.run_count >= max_runs {
                return false;
            }
        }
        true
    }
}

struct RecentlyCreated {
    name: String,
    job_id: String,
    created_at: DateTime<Utc>,
}

pub struct JobStore {
    store: FileStore,
    recent: Mutex<Vec<RecentlyCreated>>,
}

impl JobStore {
    pub fn new(store: FileStore) -> Self {
        Self {
            store,
            recent: Mutex::new(Vec::new()),
        }
    }

    pub async fn create_job(&self, mut record: JobRecord) -> anyhow::Result<JobRecord> {
        let now = Utc::now();
        let mut recent = self.recent.lock().await;
        recent.retain(|r| now.signed_duration_since(r.created_at) < ChronoDuration::seconds(DEDUP_WINDOW_SECS));

        if let Some(existing) = recent.iter().find(|r| r.name == record.name) {
            if let Some(found) = self.store.read::<JobRecord>(&existing.job_id).await? {
                return Ok(found);
            }
        }

        if record.job_id.is_empty() {
            record.job_id = Uuid::new_v4().to_string();
        }

        self.store.write(&record.job_id, &record).await?;
        recent.push(RecentlyCreated {
            name: record.name.clone(),
            job_id: record.job_id.clone(),
            created_at: now,
        });

        Ok(record)
    }

    pub async fn get(&self, job_id: &str) -> anyhow::Result<Option<JobRecord>> {
        self.store.read(job_id).await
    }

    pub async fn list_all(&self) -> anyhow::Result<Vec<JobRecord>> {
        self.store.list_all().await
    }

    pub async fn save(&self, record: &JobRecord) -> anyhow::Result<()> {
        self.store.write(&record.job_id, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(name: &str) -> JobRecord {
        JobRecord {
            job_id: String::new(),
            name: name.to_string(),
            job_type: JobType::Recurring,
            cron_expression: None,
            timezone: "UTC".to_string(),
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

    #[tokio::test]
    async fn dedup_returns_existing_job_within_window() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JobStore::new(FileStore::new(tmp.path()));
        let first = store.create_job(sample("nightly-sync")).await.unwrap();
        let second = store.create_job(sample("nightly-sync")).await.unwrap();
        assert_eq!(first.job_id, second.job_id);
    }

    #[test]
    fn disabled_job_is_never_fireable() {
        let mut job = sample("x");
        job.enabled = false;
        assert!(!job.is_fireable(Utc::now()));
    }

    #[test]
    fn exhausted_job_is_never_fireable() {
        let mut job = sample("x");
        job.max_runs = Some(3);
        job.run_count = 3;
        assert!(!job.is_fireable(Utc::now()));
    }

    #[test]
    fn expired_job_is_never_fireable() {
        let mut job = sample("x");
        job.expires_at = Some(Utc::now() - ChronoDuration::seconds(1));
        assert!(!job.is_fireable(Utc::now()));
    }
}
