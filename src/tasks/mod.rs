// src/tasks/mod.rs
// Task Queue Facade: creates Task records, persists them, and emits an
// `execute` event; does not execute tasks itself.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::bus::{Event, EventBus};
use crate::store::FileStore;

const DEDUP_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub name: String,
    pub action: serde_json::Value,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueTaskOutcome {
    pub task_id: String,
    pub status: TaskStatus,
}

/// Tracks recently-queued task names in memory for the 60 s dedup
/// window; `FileStore` alone can't answer "was this name queued
/// recently" without scanning every record.
struct RecentlyQueued {
    name: String,
    task_id: String,
    created_at: DateTime<Utc>,
}

pub struct TaskQueue {
    store: FileStore,
    bus: EventBus,
    recent: Mutex<Vec<RecentlyQueued>>,
}

impl TaskQueue {
    pub fn new(store: FileStore, bus: EventBus) -> Self {
        Self {
            store,
            bus,
            recent: Mutex::new(Vec::new()),
        }
    }

    pub async fn queue_task(&self, name: &str, action: serde_json::Value) -> anyhow::Result<QueueTaskOutcome> {
        let now = Utc::now();
        let mut recent = self.recent.lock().await;
        recent.retain(|r| now.signed_duration_since(r.created_at) < ChronoDuration::seconds(DEDUP_WINDOW_SECS));

        if let Some(existing) = recent.iter().find(|r| r.name == name) {
            return Ok(QueueTaskOutcome {
                task_id: existing.task_id.clone(),
                status: TaskStatus::Queued,
            });
        }

        let task_id = Uuid::new_v4().to_string();
        let record = TaskRecord {
            task_id: task_id.clone(),
            name: name.to_string(),
            action: action.clone(),
            status: TaskStatus::Queued,
            created_at: now,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            result: None,
            error: None,
        };

        self.store.write(&task_id, &record).await?;
        recent.push(RecentlyQueued {
            name: name.to_string(),
            task_id: task_id.clone(),
            created_at: now,
        });
        drop(recent);

        self.bus.publish(Event::BackgroundExecute {
            task_id: task_id.clone(),
            action: action.to_string(),
        });

        Ok(QueueTaskOutcome {
            task_id,
            status: TaskStatus::Queued,
        })
    }

    pub async fn get_job_status(&self, task_id: &str) -> anyhow::Result<Option<TaskRecord>> {
        self.store.read(task_id).await
    }

    pub async fn list_all(&self) -> anyhow::Result<Vec<TaskRecord>> {
        self.store.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn make_queue() -> (TaskQueue, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::new(tmp.path());
        (TaskQueue::new(store, EventBus::new()), tmp)
    }

    #[tokio::test]
    async fn queue_task_persists_and_returns_queued() {
        let (queue, _tmp) = make_queue().await;
        let outcome = queue.queue_task("backfill", json!({"tool": "x"})).await.unwrap();
        assert_eq!(outcome.status, TaskStatus::Queued);
        let record = queue.get_job_status(&outcome.task_id).await.unwrap().unwrap();
        assert_eq!(record.name, "backfill");
    }

    #[tokio::test]
    async fn duplicate_name_within_window_returns_same_task() {
        let (queue, _tmp) = make_queue().await;
        let first = queue.queue_task("backfill", json!({})).await.unwrap();
        let second = queue.queue_task("backfill", json!({})).await.unwrap();
        assert_eq!(first.task_id, second.task_id);
    }

    #[tokio::test]
    async fn distinct_names_get_distinct_tasks() {
        let (queue, _tmp) = make_queue().await;
        let first = queue.queue_task("a", json!({})).await.unwrap();
        let second = queue.queue_task("b", json!({})).await.unwrap();
        assert_ne!(first.task_id, second.task_id);
    }
}
