// src/bus.rs
// Minimal event bus: an external workflow engine subscribes to these
// events and drives actual task/job execution; the core only emits
// them.

use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum Event {
    #[serde(rename = "job/cron.execute")]
    CronExecute { job_id: String, action: String },
    #[serde(rename = "job/background.execute")]
    BackgroundExecute { task_id: String, action: String },
    #[serde(rename = "memory/backfill.start")]
    BackfillStart { task_id: String, action: String },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn publish(&self, event: Event) {
        // No subscribers is not an error: the bus is fire-and-forget
        // from the core's point of view.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
