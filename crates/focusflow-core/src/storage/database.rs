//! SQLite-backed key-value storage.
//!
//! Provides persistent storage for, per user:
//! - The three aggregate-time maps and the session history
//! - The last-used timer mode and live timer state
//! - The project hierarchy (the CLI's project store)
//!
//! Keys are `<user>:<name>`, values are JSON documents.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{data_dir, LedgerSnapshot, LedgerStore};
use crate::error::{CoreError, DatabaseError};
use crate::hierarchy::Project;
use crate::recorder::Ledger;

const TIMERS: &str = "timers";
const TOPIC_TIMERS: &str = "topic_timers";
const SUB_TOPIC_TIMERS: &str = "sub_topic_timers";
const HISTORY: &str = "history";
const TIMER_MODE: &str = "timer_mode";
const LIVE: &str = "live";
const PROJECTS: &str = "projects";

fn key(user: &str, name: &str) -> String {
    format!("{user}:{name}")
}

/// SQLite database for per-user engine state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/focusflow/focusflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("focusflow.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, DatabaseError> {
        match self.kv_get(key)? {
            Some(json) => serde_json::from_str(&json).map_err(|e| DatabaseError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            }),
            None => Ok(T::default()),
        }
    }

    pub fn load_projects(&self, user: &str) -> Result<Vec<Project>, DatabaseError> {
        self.get_json(&key(user, PROJECTS))
    }

    pub fn save_projects(&self, user: &str, projects: &[Project]) -> Result<(), DatabaseError> {
        self.kv_set(&key(user, PROJECTS), &to_json(PROJECTS, &projects)?)
    }
}

fn to_json<T: Serialize + ?Sized>(name: &str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Corrupt {
        key: name.to_string(),
        message: e.to_string(),
    })
}

impl LedgerStore for Database {
    fn load(&self, user: &str) -> Result<LedgerSnapshot, DatabaseError> {
        let mut snapshot = LedgerSnapshot {
            ledger: Ledger {
                history: self.get_json(&key(user, HISTORY))?,
                ..Default::default()
            },
            mode: self.get_json(&key(user, TIMER_MODE))?,
            live: self.get_json(&key(user, LIVE))?,
        };
        let timers = &mut snapshot.ledger.timers;
        timers.projects = self.get_json(&key(user, TIMERS))?;
        timers.topics = self.get_json(&key(user, TOPIC_TIMERS))?;
        timers.sub_topics = self.get_json(&key(user, SUB_TOPIC_TIMERS))?;
        debug!(
            user,
            sessions = snapshot.ledger.history.len(),
            "loaded ledger snapshot"
        );
        Ok(snapshot)
    }

    /// All keys are written in one transaction.
    fn save(&mut self, user: &str, snapshot: &LedgerSnapshot) -> Result<(), DatabaseError> {
        let timers = &snapshot.ledger.timers;
        let entries = [
            (TIMERS, to_json(TIMERS, &timers.projects)?),
            (TOPIC_TIMERS, to_json(TOPIC_TIMERS, &timers.topics)?),
            (SUB_TOPIC_TIMERS, to_json(SUB_TOPIC_TIMERS, &timers.sub_topics)?),
            (HISTORY, to_json(HISTORY, &snapshot.ledger.history)?),
            (TIMER_MODE, to_json(TIMER_MODE, &snapshot.mode)?),
            (LIVE, to_json(LIVE, &snapshot.live)?),
        ];

        let tx = self.conn.transaction()?;
        for (name, value) in &entries {
            tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key(user, name), value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{NodeLevel, Topic};
    use crate::timer::TimerMode;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn snapshot_is_scoped_per_user() {
        let mut db = Database::open_memory().unwrap();
        let mut snapshot = LedgerSnapshot::default();
        snapshot.ledger.timers.add(NodeLevel::Topic, "t1", 70_000);
        snapshot.mode = TimerMode::FocusCycle;
        db.save("alice", &snapshot).unwrap();

        let loaded = db.load("alice").unwrap();
        assert_eq!(loaded.ledger.timers.own_time(NodeLevel::Topic, "t1"), 70_000);
        assert_eq!(loaded.mode, TimerMode::FocusCycle);

        let other = db.load("bob").unwrap();
        assert_eq!(other.mode, TimerMode::Stopwatch);
        assert!(other.ledger.timers.topics.is_empty());
    }

    #[test]
    fn aggregate_maps_use_flat_keys() {
        let mut db = Database::open_memory().unwrap();
        let mut snapshot = LedgerSnapshot::default();
        snapshot.ledger.timers.add(NodeLevel::Project, "p1", 5);
        db.save("u", &snapshot).unwrap();
        assert_eq!(
            db.kv_get("u:timers").unwrap().unwrap(),
            r#"{"p1":{"totalTime":5}}"#
        );
    }

    #[test]
    fn corrupt_values_are_reported() {
        let db = Database::open_memory().unwrap();
        db.kv_set("u:history", "not json").unwrap();
        assert!(matches!(
            db.load("u"),
            Err(DatabaseError::Corrupt { .. })
        ));
    }

    #[test]
    fn projects_round_trip() {
        let db = Database::open_memory().unwrap();
        let projects = vec![Project {
            id: "p1".into(),
            name: "Thesis".into(),
            topics: vec![Topic {
                id: "t1".into(),
                name: "Chapter 3".into(),
                sub_topics: vec![],
            }],
        }];
        db.save_projects("u", &projects).unwrap();
        assert_eq!(db.load_projects("u").unwrap(), projects);
        assert!(db.load_projects("other").unwrap().is_empty());
    }
}
