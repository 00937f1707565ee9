//! HTTP implementations of the collaborator interfaces.
//!
//! Talk to the backend's progress and session routes. Requests block on
//! the ambient tokio runtime handle; callers treat failures as non-fatal.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::reward::ActionKind;

use super::traits::{ProgressRecorder, ProgressUpdate, SessionOutcome, SessionReporter};

/// Records cycle/quest actions at `POST /api/users/:id/progress`.
pub struct HttpProgressRecorder {
    base_url: String,
}

impl HttpProgressRecorder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct ProgressResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "totalXP", default)]
    total_xp: u64,
    #[serde(default)]
    level: u32,
    #[serde(rename = "questsCompleted", default)]
    quests_completed: u32,
    #[serde(rename = "addedXP", default)]
    added_xp: u64,
}

impl ProgressRecorder for HttpProgressRecorder {
    fn record(
        &self,
        user_id: i64,
        kind: ActionKind,
    ) -> Result<ProgressUpdate, Box<dyn std::error::Error>> {
        let url = format!("{}/api/users/{}/progress", self.base_url, user_id);
        let body = json!({ "type": kind });

        let client = Client::new();
        let handle = tokio::runtime::Handle::current();
        let resp = handle.block_on(client.post(&url).json(&body).send())?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(format!("progress endpoint returned HTTP {status}").into());
        }

        let parsed: ProgressResponse = handle.block_on(resp.json())?;
        if !parsed.success {
            return Err("progress endpoint rejected the action".into());
        }
        Ok(ProgressUpdate {
            total_xp: parsed.total_xp,
            level: parsed.level,
            quests_completed: parsed.quests_completed,
            added_xp: parsed.added_xp,
        })
    }
}

/// Reports end-of-session outcomes at `POST /api/sessions`.
pub struct HttpSessionReporter {
    base_url: String,
}

impl HttpSessionReporter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl SessionReporter for HttpSessionReporter {
    fn report(
        &self,
        user_id: i64,
        outcome: &SessionOutcome,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let url = format!("{}/api/sessions", self.base_url);
        let body = json!({
            "userId": user_id,
            "totalHours": outcome.total_hours,
            "totalCycles": outcome.total_cycles,
            "completedCycles": outcome.completed_cycles,
            "totalXpEarned": outcome.total_xp_earned,
            "status": outcome.status,
        });

        let client = Client::new();
        let handle = tokio::runtime::Handle::current();
        let resp = handle.block_on(client.post(&url).json(&body).send())?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(format!("session endpoint returned HTTP {status}").into());
        }
        Ok(())
    }
}
