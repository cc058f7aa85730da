// src/skills/poller.rs
// Skill Cron Poller: a drift-tolerant, configurable-interval loop that
// fires due skills through the Dispatcher, at most once concurrently
// per skill.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::router::Router;

use super::dispatcher::Dispatcher;
use super::types::{Skill, TriggerType};

const LIST_SKILLS_TOOL: &str = "memory_list_skills";
const UPDATE_SKILL_TOOL: &str = "memory_update_skill";

pub struct SkillPoller {
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    tick_interval: std::time::Duration,
}

impl SkillPoller {
    pub fn new(router: Arc<Router>, dispatcher: Arc<Dispatcher>, tick_interval: std::time::Duration) -> Self {
        Self {
            router,
            dispatcher,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tick_interval,
        }
    }

    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let skills = match self.fetch_skills().await {
            Ok(skills) => skills,
            Err(e) => {
                warn!(error = %e, "failed to list skills from memory provider");
                return;
            }
        };

        let now = Utc::now();
        for skill in skills {
            if !skill.enabled || !matches!(skill.trigger_type, TriggerType::Cron) {
                continue;
            }

            let Some(next_fire_at) = Self::next_fire_at(&skill) else {
                continue;
            };
            if now < next_fire_at {
                continue;
            }

            self.maybe_dispatch(skill).await;
        }
    }

    async fn maybe_dispatch(&self, skill: Skill) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.contains(&skill.id) {
            debug!(skill = %skill.id, "skipping tick, execution already in flight");
            return;
        }
        in_flight.insert(skill.id.clone());
        drop(in_flight);

        let router = self.router.clone();
        let dispatcher = self.dispatcher.clone();
        let skill_id = skill.id.clone();
        let in_flight_handle = self.in_flight.clone();

        tokio::spawn(async move {
            let mut skill = skill;
            dispatcher.dispatch(&mut skill).await;
            if let Err(e) = Self::persist(&router, &skill).await {
                warn!(skill = %skill_id, error = %e, "failed to persist skill run result");
            }
            in_flight_handle.lock().await.remove(&skill_id);
        });
    }

    async fn fetch_skills(&self) -> anyhow::Result<Vec<Skill>> {
        let value = self
            .router
            .route_tool_call(LIST_SKILLS_TOOL, serde_json::json!({}))
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        let skills = value
            .get("skills")
            .cloned()
            .unwrap_or(value);
        Ok(serde_json::from_value(skills)?)
    }

    async fn persist(router: &Router, skill: &Skill) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "id": skill.id,
            "lastRunAt": skill.last_run_at,
            "lastRunStatus": skill.last_run_status,
            "lastRunSummary": skill.last_run_summary,
            "lastNotifiedAt": skill.last_notified_at,
        });
        router
            .route_tool_call(UPDATE_SKILL_TOOL, payload)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!(e.to_string()))
    }

    /// `None` means the skill has no computable schedule (malformed
    /// trigger config) and is treated as not-due.
    fn next_fire_at(skill: &Skill) -> Option<DateTime<Utc>> {
        if let Some(minutes) = skill.trigger_config.interval_minutes {
            let base = skill.last_run_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
            return Some(base + ChronoDuration::minutes(minutes as i64));
        }

        let expr = skill.trigger_config.expression.as_ref()?;
        let schedule = cron::Schedule::from_str(expr).ok()?;
        let tz: chrono_tz::Tz = skill.trigger_config.timezone.parse().unwrap_or(chrono_tz::UTC);
        let after = skill.last_run_at.unwrap_or(DateTime::<Utc>::MIN_UTC).with_timezone(&tz);
        schedule.after(&after).next().map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::types::TriggerConfig;

    fn sample_skill(interval_minutes: Option<u32>, last_run_at: Option<DateTime<Utc>>) -> Skill {
        Skill {
            id: "s1".into(),
            agent_id: "a1".into(),
            name: "nightly".into(),
            enabled: true,
            trigger_type: TriggerType::Cron,
            trigger_config: TriggerConfig {
                expression: None,
                interval_minutes,
                timezone: "UTC".into(),
            },
            instructions: "do it".into(),
            required_tools: None,
            execution_plan: None,
            max_steps: 5,
            notify_on_completion: false,
            notify_interval_minutes: None,
            last_run_at,
            last_run_status: None,
            last_run_summary: None,
            last_notified_at: None,
        }
    }

    #[test]
    fn interval_skill_59s_since_last_run_is_not_due() {
        let skill = sample_skill(Some(1), Some(Utc::now() - ChronoDuration::seconds(59)));
        let next = SkillPoller::next_fire_at(&skill).unwrap();
        assert!(Utc::now() < next);
    }

    #[test]
    fn interval_skill_61s_since_last_run_is_due() {
        let skill = sample_skill(Some(1), Some(Utc::now() - ChronoDuration::seconds(61)));
        let next = SkillPoller::next_fire_at(&skill).unwrap();
        assert!(Utc::now() >= next);
    }

    #[test]
    fn interval_skill_never_run_is_immediately_due() {
        let skill = sample_skill(Some(5), None);
        let next = SkillPoller::next_fire_at(&skill).unwrap();
        assert!(Utc::now() >= next);
    }
}
