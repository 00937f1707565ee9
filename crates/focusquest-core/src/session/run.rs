//! Quest run state and configuration.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::AllowedResource;

/// Health a run starts with.
pub const STARTING_HEALTH: u32 = 100;

/// Terminal outcome of a quest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    Completed,
    Abandoned,
}

impl QuestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestStatus::Completed => "completed",
            QuestStatus::Abandoned => "abandoned",
        }
    }
}

/// A mission objective on the run's checklist. Completing every task
/// finishes the quest early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestTask {
    pub id: String,
    pub name: String,
    pub estimated_cycles: u32,
    pub completed: bool,
}

impl QuestTask {
    pub fn new(name: impl Into<String>, estimated_cycles: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            estimated_cycles: estimated_cycles.max(1),
            completed: false,
        }
    }
}

/// Validated session configuration. The constructors clamp raw user input;
/// the coordinator assumes the invariants hold (`total_cycles >= 1`,
/// durations > 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestConfig {
    pub total_cycles: u32,
    pub work_duration_secs: u64,
    pub break_duration_secs: u64,
    pub total_hours: f64,
    #[serde(default)]
    pub allowed_resources: Vec<AllowedResource>,
    #[serde(default)]
    pub tasks: Vec<QuestTask>,
}

impl QuestConfig {
    /// Standard 25/5 pomodoro shape: two cycles per study hour.
    /// Hours are clamped to 0.5-8.
    pub fn pomodoro(total_hours: f64) -> Self {
        let hours = total_hours.clamp(0.5, 8.0);
        let total_cycles = ((hours * 2.0).ceil() as u32).max(1);
        Self {
            total_cycles,
            work_duration_secs: 25 * 60,
            break_duration_secs: 5 * 60,
            total_hours: hours,
            allowed_resources: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Custom timer shape. Cycles are clamped to 1-20, focus minutes to
    /// 1-120, break minutes to 1-60.
    pub fn custom(cycles: u32, focus_minutes: u32, break_minutes: u32) -> Self {
        let cycles = cycles.clamp(1, 20);
        let focus = focus_minutes.clamp(1, 120);
        let rest = break_minutes.clamp(1, 60);
        Self {
            total_cycles: cycles,
            work_duration_secs: u64::from(focus) * 60,
            break_duration_secs: u64::from(rest) * 60,
            total_hours: f64::from(cycles) * f64::from(focus + rest) / 60.0,
            allowed_resources: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: Vec<AllowedResource>) -> Self {
        self.allowed_resources = resources;
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<QuestTask>) -> Self {
        self.tasks = tasks;
        self
    }
}

/// State of one quest run, owned exclusively by the session coordinator.
/// Created at session start, destroyed at completion or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRun {
    pub total_cycles: u32,
    pub current_cycle: u32,
    pub work_duration_secs: u64,
    pub break_duration_secs: u64,
    pub total_hours: f64,
    pub health: u32,
    pub earned_xp: u64,
    /// Hostnames exempt from violation checks.
    pub allowed_hostnames: BTreeSet<String>,
    /// True while the user follows a sanctioned external link.
    pub authorized_exit: bool,
    pub tasks: Vec<QuestTask>,
    pub started_at: DateTime<Utc>,
}

impl SessionRun {
    pub fn new(config: &QuestConfig) -> Self {
        Self {
            total_cycles: config.total_cycles,
            current_cycle: 0,
            work_duration_secs: config.work_duration_secs,
            break_duration_secs: config.break_duration_secs,
            total_hours: config.total_hours,
            health: STARTING_HEALTH,
            earned_xp: 0,
            allowed_hostnames: config
                .allowed_resources
                .iter()
                .map(|r| r.hostname.clone())
                .collect(),
            authorized_exit: false,
            tasks: config.tasks.clone(),
            started_at: Utc::now(),
        }
    }

    /// True once every task on a non-empty checklist is done.
    pub fn all_tasks_completed(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pomodoro_config_clamps_hours_and_derives_cycles() {
        let config = QuestConfig::pomodoro(1.0);
        assert_eq!(config.total_cycles, 2);
        assert_eq!(config.work_duration_secs, 25 * 60);
        assert_eq!(config.break_duration_secs, 5 * 60);

        assert_eq!(QuestConfig::pomodoro(0.1).total_cycles, 1);
        assert_eq!(QuestConfig::pomodoro(20.0).total_cycles, 16);
        assert_eq!(QuestConfig::pomodoro(1.5).total_cycles, 3);
    }

    #[test]
    fn custom_config_clamps_all_inputs() {
        let config = QuestConfig::custom(0, 0, 0);
        assert_eq!(config.total_cycles, 1);
        assert_eq!(config.work_duration_secs, 60);
        assert_eq!(config.break_duration_secs, 60);

        let config = QuestConfig::custom(99, 999, 999);
        assert_eq!(config.total_cycles, 20);
        assert_eq!(config.work_duration_secs, 120 * 60);
        assert_eq!(config.break_duration_secs, 60 * 60);
    }

    #[test]
    fn custom_config_computes_total_hours() {
        let config = QuestConfig::custom(4, 25, 5);
        assert!((config.total_hours - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn run_starts_at_full_health_with_derived_hostnames() {
        let resource = AllowedResource {
            id: "r1".into(),
            url: "https://Docs.RS/serde".into(),
            hostname: "docs.rs".into(),
        };
        let run = SessionRun::new(&QuestConfig::pomodoro(1.0).with_resources(vec![resource]));
        assert_eq!(run.health, STARTING_HEALTH);
        assert_eq!(run.current_cycle, 0);
        assert!(run.allowed_hostnames.contains("docs.rs"));
    }

    #[test]
    fn empty_checklist_never_counts_as_completed() {
        let run = SessionRun::new(&QuestConfig::pomodoro(1.0));
        assert!(!run.all_tasks_completed());

        let mut with_tasks = SessionRun::new(
            &QuestConfig::pomodoro(1.0).with_tasks(vec![QuestTask::new("read ch. 1", 2)]),
        );
        assert!(!with_tasks.all_tasks_completed());
        with_tasks.tasks[0].completed = true;
        assert!(with_tasks.all_tasks_completed());
    }
}
