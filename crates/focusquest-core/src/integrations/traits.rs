//! Collaborator interfaces consumed by the session coordinator.
//!
//! Both collaborators are implemented by the out-of-scope backend; the
//! coordinator treats them as best-effort. A recorder failure falls back
//! to a locally-assumed XP delta, a reporter failure is logged only -
//! neither may stall the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reward::ActionKind;
use crate::session::QuestStatus;

/// Server-confirmed progress after recording an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    pub level: u32,
    #[serde(rename = "questsCompleted")]
    pub quests_completed: u32,
    #[serde(rename = "addedXP")]
    pub added_xp: u64,
}

/// End-of-session outcome handed to the session reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub total_hours: f64,
    pub total_cycles: u32,
    pub completed_cycles: u32,
    pub total_xp_earned: u64,
    pub status: QuestStatus,
    pub started_at: DateTime<Utc>,
}

/// Grants XP/level for a completed cycle or quest.
pub trait ProgressRecorder: Send + Sync {
    fn record(
        &self,
        user_id: i64,
        kind: ActionKind,
    ) -> Result<ProgressUpdate, Box<dyn std::error::Error>>;
}

/// Persists the end-of-session outcome. Fire-and-forget.
pub trait SessionReporter: Send + Sync {
    fn report(
        &self,
        user_id: i64,
        outcome: &SessionOutcome,
    ) -> Result<(), Box<dyn std::error::Error>>;
}

/// Recorder that always fails, for unauthenticated/offline runs; the
/// coordinator's local fallback covers the XP.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressRecorder;

impl ProgressRecorder for NullProgressRecorder {
    fn record(
        &self,
        _user_id: i64,
        _kind: ActionKind,
    ) -> Result<ProgressUpdate, Box<dyn std::error::Error>> {
        Err("no progress recorder configured".into())
    }
}

/// Reporter that drops outcomes, for unauthenticated/offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSessionReporter;

impl SessionReporter for NullSessionReporter {
    fn report(
        &self,
        _user_id: i64,
        _outcome: &SessionOutcome,
    ) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
