mod config;
pub mod database;

pub use config::{
    AccountSettings, Config, CycleSettings, DisplaySettings, NotificationsConfig, SessionSettings,
};
pub use database::Database;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DatabaseError};
use crate::hierarchy::Selection;
use crate::recorder::Ledger;
use crate::timer::{FocusCycle, Stopwatch, TimerMode};

/// Returns `~/.config/focusflow[-dev]/` based on FOCUSFLOW_ENV.
///
/// Set FOCUSFLOW_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSFLOW_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusflow-dev")
    } else {
        base_dir.join("focusflow")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}

/// Transient timer state kept only so a front end can resume after restart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState {
    #[serde(default)]
    pub selection: Option<Selection>,
    #[serde(default)]
    pub stopwatch: Stopwatch,
    #[serde(default)]
    pub cycle: Option<FocusCycle>,
    /// Node the running work phase is billed to, fixed at phase start.
    #[serde(default)]
    pub cycle_attribution: Option<Selection>,
    #[serde(default)]
    pub auto_start_at_ms: Option<u64>,
}

/// Everything persisted per user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub ledger: Ledger,
    #[serde(default)]
    pub mode: TimerMode,
    #[serde(default)]
    pub live: LiveState,
}

/// Durable home of a user's aggregate maps, history and timer mode.
///
/// Writes happen after every mutation; implementations need no conflict
/// resolution.
pub trait LedgerStore: Send {
    fn load(&self, user: &str) -> Result<LedgerSnapshot, DatabaseError>;
    fn save(&mut self, user: &str, snapshot: &LedgerSnapshot) -> Result<(), DatabaseError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    snapshots: HashMap<String, String>,
    fail_writes: bool,
    writes: usize,
}

/// In-memory [`LedgerStore`]. Clones share storage, so a test can keep a
/// handle after giving one to a tracker.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every following write fail until turned off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn snapshot(&self, user: &str) -> Option<LedgerSnapshot> {
        self.lock()
            .snapshots
            .get(user)
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self, user: &str) -> Result<LedgerSnapshot, DatabaseError> {
        match self.lock().snapshots.get(user) {
            Some(json) => serde_json::from_str(json).map_err(|e| DatabaseError::Corrupt {
                key: user.to_string(),
                message: e.to_string(),
            }),
            None => Ok(LedgerSnapshot::default()),
        }
    }

    fn save(&mut self, user: &str, snapshot: &LedgerSnapshot) -> Result<(), DatabaseError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(DatabaseError::WriteRejected("memory store is read-only".into()));
        }
        let json = serde_json::to_string(snapshot).map_err(|e| DatabaseError::Corrupt {
            key: user.to_string(),
            message: e.to_string(),
        })?;
        inner.snapshots.insert(user.to_string(), json);
        inner.writes += 1;
        Ok(())
    }
}
