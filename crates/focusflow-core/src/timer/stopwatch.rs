//! Count-up timer for open-ended focus intervals.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!   ^________ reset / end_session ________|
//! ```
//!
//! Elapsed time is always `accumulated + (now - anchor)`. The display value
//! refreshed by [`Stopwatch::sample`] is cosmetic; pause and
//! [`Stopwatch::end_session`] recompute from the anchor at the instant of
//! the call, so a late or skipped sample never changes what gets committed.

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::recorder::Interval;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopwatchState {
    #[default]
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stopwatch {
    state: StopwatchState,
    /// Epoch ms of the last start/resume. Only set while running.
    #[serde(default)]
    anchor_epoch_ms: Option<u64>,
    /// Time banked by earlier running stretches of this interval.
    #[serde(default)]
    accumulated_ms: u64,
    /// Epoch ms at which the interval was first started.
    #[serde(default)]
    started_epoch_ms: Option<u64>,
    #[serde(skip)]
    display_ms: u64,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> StopwatchState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == StopwatchState::Running
    }

    /// True while an interval is open (running or paused).
    pub fn has_interval(&self) -> bool {
        self.state != StopwatchState::Idle
    }

    /// Exact elapsed time at `now_ms`.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        let running = self
            .anchor_epoch_ms
            .map(|anchor| now_ms.saturating_sub(anchor))
            .unwrap_or(0);
        self.accumulated_ms.saturating_add(running)
    }

    /// Last sampled value, for display only.
    pub fn display_ms(&self) -> u64 {
        self.display_ms
    }

    pub fn started_epoch_ms(&self) -> Option<u64> {
        self.started_epoch_ms
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a new interval or resume a paused one.
    pub fn start(&mut self, now_ms: u64) -> Option<Event> {
        match self.state {
            StopwatchState::Running => None,
            StopwatchState::Idle => {
                self.state = StopwatchState::Running;
                self.anchor_epoch_ms = Some(now_ms);
                self.accumulated_ms = 0;
                self.started_epoch_ms = Some(now_ms);
                self.display_ms = 0;
                Some(Event::StopwatchStarted { at_ms: now_ms })
            }
            StopwatchState::Paused => {
                self.state = StopwatchState::Running;
                self.anchor_epoch_ms = Some(now_ms);
                Some(Event::StopwatchResumed {
                    elapsed_ms: self.accumulated_ms,
                    at_ms: now_ms,
                })
            }
        }
    }

    pub fn pause(&mut self, now_ms: u64) -> Option<Event> {
        if self.state != StopwatchState::Running {
            return None;
        }
        self.flush_elapsed(now_ms);
        self.state = StopwatchState::Paused;
        self.display_ms = self.accumulated_ms;
        Some(Event::StopwatchPaused {
            elapsed_ms: self.accumulated_ms,
            at_ms: now_ms,
        })
    }

    /// Discard the interval. Nothing is committed.
    pub fn reset(&mut self) -> Option<Event> {
        let was_open = self.has_interval();
        *self = Self::default();
        was_open.then_some(Event::StopwatchReset)
    }

    /// Refresh the display value. A no-op unless running.
    pub fn sample(&mut self, now_ms: u64) -> u64 {
        if self.is_running() {
            self.display_ms = self.elapsed_ms(now_ms);
        }
        self.display_ms
    }

    /// Close the interval, returning its exact duration, and reset.
    ///
    /// Returns `None` when no interval is open.
    pub fn end_session(&mut self, now_ms: u64) -> Option<Interval> {
        if !self.has_interval() {
            return None;
        }
        let duration_ms = self.elapsed_ms(now_ms);
        let started_at_ms = self.started_epoch_ms.unwrap_or(now_ms);
        *self = Self::default();
        Some(Interval {
            started_at_ms,
            ended_at_ms: now_ms,
            duration_ms,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn flush_elapsed(&mut self, now_ms: u64) {
        self.accumulated_ms = self.elapsed_ms(now_ms);
        self.anchor_epoch_ms = None;
    }
}
