//! Local session reporter writing quest history into the SQLite database.
//!
//! Used by the CLI, which keeps its own history instead of posting to the
//! web backend.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::storage::Database;

use super::traits::{SessionOutcome, SessionReporter};

pub struct DbSessionReporter {
    db: Arc<Mutex<Database>>,
}

impl DbSessionReporter {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

impl SessionReporter for DbSessionReporter {
    fn report(
        &self,
        _user_id: i64,
        outcome: &SessionOutcome,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let db = self.db.lock().map_err(|e| e.to_string())?;
        db.record_quest(
            outcome.total_hours,
            outcome.total_cycles,
            outcome.completed_cycles,
            outcome.total_xp_earned,
            outcome.status,
            outcome.started_at,
            Utc::now(),
        )?;
        Ok(())
    }
}
