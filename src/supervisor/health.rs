// src/supervisor/health.rs
// Per-provider health state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Starting,
    Ready,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub name: String,
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub restart_count: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_requests: u64,
    pub total_failures: u64,
}

impl ProviderHealth {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: HealthState::Starting,
            consecutive_failures: 0,
            restart_count: 0,
            last_success: None,
            last_error: None,
            total_requests: 0,
            total_failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.state = HealthState::Ready;
        self.consecutive_failures = 0;
        self.last_success = Some(Utc::now());
        self.total_requests += 1;
    }

    /// Returns true if this failure pushed the provider into the Failed
    /// state (two consecutive probe failures).
    pub fn record_failure(&mut self, error: impl Into<String>) -> bool {
        self.consecutive_failures += 1;
        self.total_requests += 1;
        self.total_failures += 1;
        self.last_error = Some(error.into());
        if self.consecutive_failures >= 2 {
            self.state = HealthState::Failed;
            true
        } else {
            false
        }
    }

    pub fn mark_stopped(&mut self) {
        self.state = HealthState::Stopped;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        (self.total_requests - self.total_failures) as f64 / self.total_requests as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_failure_does_not_mark_failed() {
        let mut h = ProviderHealth::new("git");
        assert!(!h.record_failure("timeout"));
        assert_eq!(h.state, HealthState::Starting);
    }

    #[test]
    fn two_consecutive_failures_marks_failed() {
        let mut h = ProviderHealth::new("git");
        h.record_failure("timeout");
        assert!(h.record_failure("timeout again"));
        assert_eq!(h.state, HealthState::Failed);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let mut h = ProviderHealth::new("git");
        h.record_failure("timeout");
        h.record_success();
        assert_eq!(h.consecutive_failures, 0);
        assert_eq!(h.state, HealthState::Ready);
    }
}
