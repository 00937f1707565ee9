//! SQLite-based quest history and application state.
//!
//! Provides persistent storage for:
//! - Finished quest runs (completed and abandoned) and their statistics
//! - User-declared allowed resources (the violation allow-list seed)
//! - Key-value store for application state (coordinator snapshot,
//!   monitoring state)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::monitor::normalize_hostname;
use crate::session::QuestStatus;

use super::data_dir;

/// One finished quest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestRecord {
    pub id: i64,
    pub total_hours: f64,
    pub total_cycles: u32,
    pub completed_cycles: u32,
    pub xp_earned: u64,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// User-declared resource exempt from violation checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowedResource {
    pub id: String,
    pub url: String,
    /// Hostname derived from `url` at insert time.
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_quests: u64,
    pub completed_quests: u64,
    pub abandoned_quests: u64,
    pub total_cycles_completed: u64,
    pub total_xp_earned: u64,
    pub today_quests: u64,
    pub today_xp_earned: u64,
}

/// SQLite database for quest storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/focusquest/focusquest.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?
            .join("focusquest.db");
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests and ephemeral runs).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS quests (
                    id               INTEGER PRIMARY KEY AUTOINCREMENT,
                    total_hours      REAL NOT NULL,
                    total_cycles     INTEGER NOT NULL,
                    completed_cycles INTEGER NOT NULL,
                    xp_earned        INTEGER NOT NULL,
                    status           TEXT NOT NULL,
                    started_at       TEXT NOT NULL,
                    finished_at      TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS resources (
                    id       TEXT PRIMARY KEY,
                    url      TEXT NOT NULL,
                    hostname TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_quests_finished_at ON quests(finished_at);
                CREATE INDEX IF NOT EXISTS idx_quests_status ON quests(status);",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    // ── Quests ───────────────────────────────────────────────────────

    /// Record a finished quest run.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_quest(
        &self,
        total_hours: f64,
        total_cycles: u32,
        completed_cycles: u32,
        xp_earned: u64,
        status: QuestStatus,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO quests (total_hours, total_cycles, completed_cycles, xp_earned, status, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                total_hours,
                total_cycles,
                completed_cycles,
                xp_earned,
                status.as_str(),
                started_at.to_rfc3339(),
                finished_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent quests, newest first.
    pub fn recent_quests(&self, limit: u32) -> Result<Vec<QuestRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, total_hours, total_cycles, completed_cycles, xp_earned, status, started_at, finished_at
             FROM quests ORDER BY finished_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut quests = Vec::new();
        for row in rows {
            let (id, total_hours, total_cycles, completed_cycles, xp_earned, status, started, finished) =
                row?;
            quests.push(QuestRecord {
                id,
                total_hours,
                total_cycles,
                completed_cycles,
                xp_earned,
                status,
                started_at: parse_timestamp(&started)?,
                finished_at: parse_timestamp(&finished)?,
            });
        }
        Ok(quests)
    }

    pub fn stats_all(&self) -> Result<Stats, StorageError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let today_floor = format!("{today}T00:00:00+00:00");

        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*), COALESCE(SUM(completed_cycles), 0), COALESCE(SUM(xp_earned), 0)
             FROM quests GROUP BY status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (status, count, cycles, xp) = row?;
            stats.total_quests += count;
            stats.total_cycles_completed += cycles;
            stats.total_xp_earned += xp;
            match status.as_str() {
                "completed" => stats.completed_quests += count,
                "abandoned" => stats.abandoned_quests += count,
                _ => {}
            }
        }

        let (today_quests, today_xp): (u64, u64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(xp_earned), 0) FROM quests WHERE finished_at >= ?1",
            params![today_floor],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        stats.today_quests = today_quests;
        stats.today_xp_earned = today_xp;

        Ok(stats)
    }

    // ── Resources ────────────────────────────────────────────────────

    /// Add an allowed resource, deriving its hostname from the URL.
    pub fn add_resource(&self, url: &str) -> Result<AllowedResource, StorageError> {
        let resource = AllowedResource {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            hostname: normalize_hostname(url),
        };
        self.conn.execute(
            "INSERT INTO resources (id, url, hostname) VALUES (?1, ?2, ?3)",
            params![resource.id, resource.url, resource.hostname],
        )?;
        Ok(resource)
    }

    pub fn list_resources(&self) -> Result<Vec<AllowedResource>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, url, hostname FROM resources ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(AllowedResource {
                id: row.get(0)?,
                url: row.get(1)?,
                hostname: row.get(2)?,
            })
        })?;
        let mut resources = Vec::new();
        for row in rows {
            resources.push(row?);
        }
        Ok(resources)
    }

    /// Returns true if a resource was removed.
    pub fn remove_resource(&self, id: &str) -> Result<bool, StorageError> {
        let removed = self
            .conn
            .execute("DELETE FROM resources WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    // ── Key-value store ──────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptState {
            key: "timestamp".to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_aggregates_quests() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_quest(1.0, 2, 2, 900, QuestStatus::Completed, now, now)
            .unwrap();
        db.record_quest(0.5, 1, 0, 0, QuestStatus::Abandoned, now, now)
            .unwrap();

        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_quests, 2);
        assert_eq!(stats.completed_quests, 1);
        assert_eq!(stats.abandoned_quests, 1);
        assert_eq!(stats.total_cycles_completed, 2);
        assert_eq!(stats.total_xp_earned, 900);
        assert_eq!(stats.today_quests, 2);

        let recent = db.recent_quests(10).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn resources_round_trip_with_derived_hostname() {
        let db = Database::open_memory().unwrap();
        let resource = db.add_resource("https://Docs.RS/serde").unwrap();
        assert_eq!(resource.hostname, "docs.rs");

        let listed = db.list_resources().unwrap();
        assert_eq!(listed, vec![resource.clone()]);

        assert!(db.remove_resource(&resource.id).unwrap());
        assert!(!db.remove_resource(&resource.id).unwrap());
        assert!(db.list_resources().unwrap().is_empty());
    }

    #[test]
    fn kv_round_trip() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.kv_get("missing").unwrap(), None);
        db.kv_set("k", "v1").unwrap();
        db.kv_set("k", "v2").unwrap();
        assert_eq!(db.kv_get("k").unwrap(), Some("v2".to_string()));
        db.kv_delete("k").unwrap();
        assert_eq!(db.kv_get("k").unwrap(), None);
    }
}
