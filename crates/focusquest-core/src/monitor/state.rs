//! Persisted monitoring state.
//!
//! The background process is restartable at any time, so its monitoring
//! state is never held as ambient globals: it lives in a [`MonitorStore`]
//! that is loaded on startup and before every navigation check, and saved
//! on every mutation. Reads accept eventual-consistency latency instead of
//! strict synchronization.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StorageError;
use crate::storage::Database;

use super::TabId;

/// Process-wide monitoring state of the background context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub quest_active: bool,
    /// Lowercase hostnames exempt from violation checks.
    pub allowed_hosts: Vec<String>,
    /// Tab hosting the focus app; its own navigations are never violations.
    pub protected_tab: Option<TabId>,
}

/// Load/save lifecycle for [`MonitorState`].
pub trait MonitorStore {
    fn load(&self) -> Result<MonitorState, StorageError>;
    fn save(&self, state: &MonitorState) -> Result<(), StorageError>;
}

/// In-memory store for tests and ephemeral runs. Cloning shares the
/// underlying state, which lets a test simulate a background restart by
/// handing the same store to a fresh monitor.
#[derive(Debug, Clone, Default)]
pub struct MemoryMonitorStore(Arc<Mutex<MonitorState>>);

impl MonitorStore for MemoryMonitorStore {
    fn load(&self) -> Result<MonitorState, StorageError> {
        let state = self.0.lock().map_err(|_| StorageError::Locked)?;
        Ok(state.clone())
    }

    fn save(&self, state: &MonitorState) -> Result<(), StorageError> {
        let mut slot = self.0.lock().map_err(|_| StorageError::Locked)?;
        *slot = state.clone();
        Ok(())
    }
}

const MONITOR_STATE_KEY: &str = "monitor_state";

/// Store backed by the key-value table of the SQLite database.
pub struct KvMonitorStore {
    db: Database,
}

impl KvMonitorStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl MonitorStore for KvMonitorStore {
    fn load(&self) -> Result<MonitorState, StorageError> {
        match self.db.kv_get(MONITOR_STATE_KEY)? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(state) => Ok(state),
                Err(err) => {
                    warn!(%err, "corrupt monitor state; starting from defaults");
                    Ok(MonitorState::default())
                }
            },
            None => Ok(MonitorState::default()),
        }
    }

    fn save(&self, state: &MonitorState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state)
            .map_err(|err| StorageError::CorruptState {
                key: MONITOR_STATE_KEY.to_string(),
                message: err.to_string(),
            })?;
        self.db.kv_set(MONITOR_STATE_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryMonitorStore::default();
        let state = MonitorState {
            quest_active: true,
            allowed_hosts: vec!["docs.rs".into()],
            protected_tab: Some(7),
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn cloned_memory_store_shares_state() {
        let store = MemoryMonitorStore::default();
        let clone = store.clone();
        store
            .save(&MonitorState {
                quest_active: true,
                ..MonitorState::default()
            })
            .unwrap();
        assert!(clone.load().unwrap().quest_active);
    }

    #[test]
    fn kv_store_round_trips_and_defaults() {
        let store = KvMonitorStore::new(Database::open_memory().unwrap());
        assert_eq!(store.load().unwrap(), MonitorState::default());

        let state = MonitorState {
            quest_active: true,
            allowed_hosts: vec!["chatgpt.com".into()],
            protected_tab: Some(3),
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn kv_store_survives_corrupt_payload() {
        let db = Database::open_memory().unwrap();
        db.kv_set(MONITOR_STATE_KEY, "not json").unwrap();
        let store = KvMonitorStore::new(db);
        assert_eq!(store.load().unwrap(), MonitorState::default());
    }
}
