use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::focus::FocusState;

/// Every observable change in a quest run produces an Event.
/// The UI polls for events; the CLI prints them as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    QuestStarted {
        total_cycles: u32,
        work_duration_secs: u64,
        break_duration_secs: u64,
        allowed_hosts: Vec<String>,
        at: DateTime<Utc>,
    },
    StateChanged {
        state: FocusState,
        at: DateTime<Utc>,
    },
    CycleCompleted {
        cycle: u32,
        total_cycles: u32,
        added_xp: u64,
        at: DateTime<Utc>,
    },
    BreakStarted {
        cycle: u32,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    FocusResumed {
        cycle: u32,
        at: DateTime<Utc>,
    },
    /// Health dropped by `amount` due to an active penalty.
    HealthDrained {
        amount: u32,
        health: u32,
        at: DateTime<Utc>,
    },
    /// The extension reported navigation to a disallowed hostname.
    ViolationReported {
        hostname: String,
        at: DateTime<Utc>,
    },
    /// The companion extension announced itself on the bridge.
    ExtensionLinked {
        at: DateTime<Utc>,
    },
    QuestCompleted {
        completed_cycles: u32,
        earned_xp: u64,
        at: DateTime<Utc>,
    },
    QuestFailed {
        completed_cycles: u32,
        earned_xp: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: FocusState,
        current_cycle: u32,
        total_cycles: u32,
        health: u32,
        earned_xp: u64,
        extension_connected: bool,
        at: DateTime<Utc>,
    },
}
