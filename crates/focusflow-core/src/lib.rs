//! # FocusFlow Core Library
//!
//! Study-time tracking over a Project > Topic > Sub-topic hierarchy. The
//! CLI is a thin layer over this crate; any other front end can drive the
//! same engine.
//!
//! ## Architecture
//!
//! - **Timers**: wall-clock state machines (count-up stopwatch and the
//!   work / break focus cycle) that never read the clock themselves
//! - **Tracker**: the engine instance owning selection, timers and the
//!   session ledger; every mutation is persisted through a [`LedgerStore`]
//! - **Storage**: SQLite key-value store and TOML configuration
//! - **Driver**: a tokio task that owns one tracker and serializes commands
//!
//! ## Key Components
//!
//! - [`Tracker`]: task selection context and timer engine
//! - [`SessionRecorder`]: validates and commits finished intervals
//! - [`Database`]: per-user ledger persistence
//! - [`Config`]: application configuration management

pub mod clock;
pub mod driver;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod notify;
pub mod recorder;
pub mod report;
pub mod storage;
pub mod timer;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::{DiscardReason, Event};
pub use hierarchy::{NodeLevel, NodeRef, Project, Selection, SubTopic, Topic};
pub use notify::{Cue, CueKind, Notifier, NoopNotifier, TracingNotifier};
pub use recorder::{AggregateTimers, Interval, Ledger, SessionRecord, SessionRecorder};
pub use storage::{Config, Database, LedgerSnapshot, LedgerStore, MemoryStore};
pub use timer::{CycleConfig, FocusCycle, Phase, Stopwatch, StopwatchState, TimerMode};
pub use tracker::{
    Confirm, ConfirmPrompt, SelectOutcome, SelectPlan, Status, Tracker, TrackerSettings,
};
