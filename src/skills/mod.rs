// src/skills/mod.rs

pub mod dispatcher;
pub mod poller;
pub mod types;

pub use dispatcher::Dispatcher;
pub use poller::SkillPoller;
pub use types::{ExecutionStep, Skill, TriggerConfig, TriggerType};
