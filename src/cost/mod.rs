// src/cost/mod.rs
// Cost Monitor: sliding 60-minute window of one-minute token buckets,
// with hard-cap and spike pause rules.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;

const WINDOW_MINUTES: i64 = 60;

/// Groups a token count into comma-separated thousands for pause reasons
/// surfaced to operators (e.g. `11000` -> `"11,000"`).
fn grouped(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Bucket {
    pub input: u64,
    pub output: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PauseState {
    pub paused: bool,
    pub reason: Option<String>,
}

pub struct CostMonitorConfig {
    pub enabled: bool,
    pub hard_cap_tokens_per_hour: u64,
    pub minimum_baseline_tokens: u64,
    pub short_window_minutes: i64,
    pub minimum_baseline_rate: f64,
    pub spike_multiplier: f64,
}

impl Default for CostMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hard_cap_tokens_per_hour: 100_000,
            minimum_baseline_tokens: 5_000,
            short_window_minutes: 5,
            minimum_baseline_rate: 10.0,
            spike_multiplier: 4.0,
        }
    }
}

struct Inner {
    // Keyed by minute-since-epoch so bucket identity is stable across
    // calls without needing a clock abstraction threaded through.
    buckets: BTreeMap<i64, Bucket>,
    paused: bool,
    reason: Option<String>,
}

/// Per-agent monitor. The orchestrator holds one instance per agentId.
pub struct CostMonitor {
    config: CostMonitorConfig,
    inner: RwLock<Inner>,
}

impl CostMonitor {
    pub fn new(config: CostMonitorConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                buckets: BTreeMap::new(),
                paused: false,
                reason: None,
            }),
        }
    }

    fn current_minute() -> i64 {
        chrono::Utc::now().timestamp() / 60
    }

    fn evict_old(inner: &mut Inner, now_minute: i64) {
        let cutoff = now_minute - WINDOW_MINUTES;
        inner.buckets.retain(|minute, _| *minute > cutoff);
    }

    pub fn record_usage(&self, input: u64, output: u64) -> PauseState {
        if !self.config.enabled {
            return PauseState {
                paused: false,
                reason: None,
            };
        }

        let now = Self::current_minute();
        let mut inner = self.inner.write();
        Self::evict_old(&mut inner, now);

        let bucket = inner.buckets.entry(now).or_default();
        bucket.input += input;
        bucket.output += output;

        self.evaluate_pause(&mut inner, now);

        PauseState {
            paused: inner.paused,
            reason: inner.reason.clone(),
        }
    }

    fn window_total(inner: &Inner, since_minute: i64) -> u64 {
        inner
            .buckets
            .iter()
            .filter(|(minute, _)| **minute > since_minute)
            .map(|(_, b)| b.input + b.output)
            .sum()
    }

    fn evaluate_pause(&self, inner: &mut Inner, now: i64) {
        let window_cutoff = now - WINDOW_MINUTES;
        let total: u64 = Self::window_total(inner, window_cutoff);

        if total >= self.config.hard_cap_tokens_per_hour {
            inner.paused = true;
            inner.reason = Some(format!("Hard cap exceeded: {}", grouped(total)));
            return;
        }

        if total >= self.config.minimum_baseline_tokens {
            let short_cutoff = now - self.config.short_window_minutes;
            let recent_total = Self::window_total(inner, short_cutoff);
            let baseline_total = total - recent_total;
            let baseline_minutes = (WINDOW_MINUTES - self.config.short_window_minutes).max(1) as f64;
            let baseline_rate = baseline_total as f64 / baseline_minutes;
            let effective_baseline = baseline_rate.max(self.config.minimum_baseline_rate);
            let recent_rate = recent_total as f64 / self.config.short_window_minutes.max(1) as f64;

            if recent_rate > effective_baseline * self.config.spike_multiplier {
                inner.paused = true;
                inner.reason = Some("Token spike detected".to_string());
            }
        }
    }

    pub fn window_total_now(&self) -> u64 {
        let now = Self::current_minute();
        let mut inner = self.inner.write();
        Self::evict_old(&mut inner, now);
        Self::window_total(&inner, now - WINDOW_MINUTES)
    }

    pub fn active_bucket_count(&self) -> usize {
        let now = Self::current_minute();
        let mut inner = self.inner.write();
        Self::evict_old(&mut inner, now);
        inner.buckets.len()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.read().paused
    }

    /// Clears the pause flag; when `reset` is true also evicts every
    /// bucket.
    pub fn resume(&self, reset: bool) {
        let mut inner = self.inner.write();
        inner.paused = false;
        inner.reason = None;
        if reset {
            inner.buckets.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CostMonitorConfig {
        CostMonitorConfig {
            enabled: true,
            hard_cap_tokens_per_hour: 10_000,
            minimum_baseline_tokens: 5_000,
            short_window_minutes: 5,
            minimum_baseline_rate: 10.0,
            spike_multiplier: 4.0,
        }
    }

    #[test]
    fn grouped_inserts_thousands_separators() {
        assert_eq!(grouped(0), "0");
        assert_eq!(grouped(999), "999");
        assert_eq!(grouped(11_000), "11,000");
        assert_eq!(grouped(1_234_567), "1,234,567");
    }

    #[test]
    fn window_total_is_sum_of_recorded_tokens() {
        let monitor = CostMonitor::new(test_config());
        monitor.record_usage(100, 50);
        monitor.record_usage(20, 10);
        assert_eq!(monitor.window_total_now(), 180);
    }

    #[test]
    fn hard_cap_pauses_with_total_in_reason() {
        let monitor = CostMonitor::new(test_config());
        let first = monitor.record_usage(6000, 0);
        assert!(!first.paused);
        let second = monitor.record_usage(5000, 0);
        assert!(second.paused);
        assert_eq!(second.reason.unwrap(), "Hard cap exceeded: 11,000");
    }

    #[test]
    fn resume_clears_pause() {
        let monitor = CostMonitor::new(test_config());
        monitor.record_usage(6000, 0);
        monitor.record_usage(5000, 0);
        assert!(monitor.is_paused());
        monitor.resume(true);
        assert!(!monitor.is_paused());
        assert_eq!(monitor.window_total_now(), 0);
        assert_eq!(monitor.active_bucket_count(), 0);
    }

    #[test]
    fn disabled_monitor_never_pauses() {
        let mut config = test_config();
        config.enabled = false;
        let monitor = CostMonitor::new(config);
        let state = monitor.record_usage(999_999, 0);
        assert!(!state.paused);
    }
}
