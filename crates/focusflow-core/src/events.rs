use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hierarchy::{NodeLevel, Selection};
use crate::recorder::SessionRecord;
use crate::timer::{Phase, TimerMode};

/// Every state change in the engine produces an Event.
/// Front ends print or forward them; nothing inside the core consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    StopwatchStarted {
        at_ms: u64,
    },
    StopwatchPaused {
        elapsed_ms: u64,
        at_ms: u64,
    },
    StopwatchResumed {
        elapsed_ms: u64,
        at_ms: u64,
    },
    StopwatchReset,
    PhaseStarted {
        phase: Phase,
        seconds_remaining: u64,
        cycle_count: u32,
        /// False when the phase runs for the first time.
        resumed: bool,
        at: DateTime<Utc>,
    },
    PhasePaused {
        phase: Phase,
        seconds_remaining: u64,
        at: DateTime<Utc>,
    },
    PhaseNearEnd {
        phase: Phase,
        seconds_remaining: u64,
    },
    PhaseCompleted {
        phase: Phase,
        cycle_count: u32,
        next_phase: Phase,
        at: DateTime<Utc>,
    },
    PhaseReset {
        phase: Phase,
        seconds_remaining: u64,
    },
    SessionRecorded {
        record: SessionRecord,
    },
    SessionDiscarded {
        reason: DiscardReason,
        duration_ms: u64,
    },
    SelectionChanged {
        selection: Option<Selection>,
    },
    ModeChanged {
        mode: TimerMode,
    },
    NodeDeleted {
        node_id: String,
        level: Option<NodeLevel>,
        removed_sessions: usize,
    },
    HistoryCleared {
        removed_sessions: usize,
    },
    /// The store rejected a write; in-memory state is still authoritative.
    PersistenceFailed {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// Below the minimum session length.
    TooShort,
    /// No node was selected to attribute the time to.
    NoSelection,
    /// The owning node was deleted mid-interval.
    NodeDeleted,
    /// A break phase, which never counts as focus time.
    BreakPhase,
}
