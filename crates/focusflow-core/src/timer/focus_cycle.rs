//! Focus-cycle countdown (work / short break / long break).
//!
//! Like the stopwatch this is a wall-clock state machine with no thread of
//! its own: the owner calls [`FocusCycle::tick`] whenever it wakes up. On
//! start the engine arms an expected-end timestamp and every tick recomputes
//! the remaining time from it, so throttled or missed ticks never make the
//! countdown drift.
//!
//! ## State Transitions
//!
//! ```text
//! Work(active) --complete--> ShortBreak | LongBreak --complete--> Work
//!    |  ^
//! pause  start            (breaks cannot be paused)
//!    v  |
//! Work(paused)
//! ```

use serde::{Deserialize, Serialize};

use super::phase::{CycleConfig, Phase};
use crate::clock::to_datetime;
use crate::error::CoreError;
use crate::events::Event;

/// Something that happened purely because time passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleSignal {
    NearEnd {
        phase: Phase,
        seconds_remaining: u64,
    },
    Completed(CompletedPhase),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedPhase {
    pub phase: Phase,
    /// When the phase was first started, before any pauses.
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    /// The configured phase length, which is what a finished phase is worth.
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusCycle {
    #[serde(skip)]
    config: CycleConfig,
    phase: Phase,
    is_active: bool,
    /// Remaining time as of the last tick, pause or reset.
    remaining_ms: u64,
    cycle_count: u32,
    #[serde(default)]
    expected_end_epoch_ms: Option<u64>,
    #[serde(default)]
    phase_started_epoch_ms: Option<u64>,
    /// Set before completion side effects run, cleared once the next
    /// phase is armed.
    #[serde(default)]
    completion_handled: bool,
    #[serde(default)]
    near_end_announced: bool,
}

impl FocusCycle {
    pub fn new(config: CycleConfig) -> Self {
        Self {
            config,
            phase: Phase::Work,
            is_active: false,
            remaining_ms: config.ms_for(Phase::Work),
            cycle_count: 0,
            expected_end_epoch_ms: None,
            phase_started_epoch_ms: None,
            completion_handled: false,
            near_end_announced: false,
        }
    }

    /// Swap the phase lengths. An untouched phase picks up the new length.
    pub fn set_config(&mut self, config: CycleConfig) {
        self.config = config;
        if !self.is_active && self.phase_started_epoch_ms.is_none() {
            self.remaining_ms = config.ms_for(self.phase);
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn completion_handled(&self) -> bool {
        self.completion_handled
    }

    /// True once the current phase has run at all (active or paused).
    pub fn in_progress(&self) -> bool {
        self.phase_started_epoch_ms.is_some()
    }

    /// Whole seconds left as of the last tick, rounded to nearest.
    pub fn seconds_remaining(&self) -> u64 {
        round_secs(self.remaining_ms)
    }

    /// Exact remaining time at `now_ms`.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match (self.is_active, self.expected_end_epoch_ms) {
            (true, Some(end)) => end.saturating_sub(now_ms),
            _ => self.remaining_ms,
        }
    }

    pub fn seconds_remaining_at(&self, now_ms: u64) -> u64 {
        round_secs(self.remaining_ms(now_ms))
    }

    /// How much of the current phase has elapsed at `now_ms`.
    pub fn elapsed_in_phase_ms(&self, now_ms: u64) -> u64 {
        self.config
            .ms_for(self.phase)
            .saturating_sub(self.remaining_ms(now_ms))
    }

    pub fn phase_started_epoch_ms(&self) -> Option<u64> {
        self.phase_started_epoch_ms
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, now_ms: u64) -> Option<Event> {
        if self.is_active || self.remaining_ms == 0 {
            return None;
        }
        let resumed = self.phase_started_epoch_ms.is_some();
        self.is_active = true;
        self.expected_end_epoch_ms = Some(now_ms.saturating_add(self.remaining_ms));
        self.phase_started_epoch_ms.get_or_insert(now_ms);
        self.completion_handled = false;
        Some(Event::PhaseStarted {
            phase: self.phase,
            seconds_remaining: self.seconds_remaining(),
            cycle_count: self.cycle_count,
            resumed,
            at: to_datetime(now_ms),
        })
    }

    /// Freeze the countdown. Only work phases can be paused.
    pub fn pause(&mut self, now_ms: u64) -> Result<Option<Event>, CoreError> {
        if !self.is_active {
            return Ok(None);
        }
        if self.phase.is_break() {
            return Err(CoreError::InvalidPhaseTransition {
                phase: self.phase,
                action: "pause",
            });
        }
        self.remaining_ms = self.remaining_ms(now_ms);
        self.is_active = false;
        self.expected_end_epoch_ms = None;
        Ok(Some(Event::PhasePaused {
            phase: self.phase,
            seconds_remaining: self.seconds_remaining(),
            at: to_datetime(now_ms),
        }))
    }

    /// Stop and load a fresh `phase`. The cycle counter is kept.
    pub fn reset(&mut self, phase: Phase) -> Event {
        self.phase = phase;
        self.is_active = false;
        self.remaining_ms = self.config.ms_for(phase);
        self.expected_end_epoch_ms = None;
        self.phase_started_epoch_ms = None;
        self.near_end_announced = false;
        Event::PhaseReset {
            phase,
            seconds_remaining: self.seconds_remaining(),
        }
    }

    /// Recompute the countdown from the armed end time.
    ///
    /// Stray ticks while inactive are ignored.
    pub fn tick(&mut self, now_ms: u64) -> Option<CycleSignal> {
        if !self.is_active {
            return None;
        }
        self.remaining_ms = self.remaining_ms(now_ms);
        let seconds_remaining = self.seconds_remaining();
        if seconds_remaining == 0 {
            return self.complete(now_ms).map(CycleSignal::Completed);
        }
        if !self.near_end_announced && seconds_remaining <= self.config.near_end_secs {
            self.near_end_announced = true;
            return Some(CycleSignal::NearEnd {
                phase: self.phase,
                seconds_remaining,
            });
        }
        None
    }

    /// Finish the phase if its time is up. Fires at most once per phase.
    pub fn complete(&mut self, now_ms: u64) -> Option<CompletedPhase> {
        if self.completion_handled || !self.is_active {
            return None;
        }
        if round_secs(self.remaining_ms(now_ms)) > 0 {
            return None;
        }
        self.completion_handled = true;
        self.is_active = false;
        self.remaining_ms = 0;
        self.expected_end_epoch_ms = None;
        Some(CompletedPhase {
            phase: self.phase,
            started_at_ms: self.phase_started_epoch_ms.unwrap_or(now_ms),
            ended_at_ms: now_ms,
            duration_ms: self.config.ms_for(self.phase),
        })
    }

    /// Load the phase that follows the current one.
    ///
    /// Finishing a work phase bumps the cycle counter and picks a short or
    /// long break; finishing a break goes back to work.
    pub fn advance(&mut self) -> Phase {
        let next = if self.phase == Phase::Work {
            self.cycle_count = self.cycle_count.saturating_add(1);
            self.config.break_after(self.cycle_count)
        } else {
            Phase::Work
        };
        self.reset(next);
        next
    }
}

impl Default for FocusCycle {
    fn default() -> Self {
        Self::new(CycleConfig::default())
    }
}

fn round_secs(ms: u64) -> u64 {
    ms.saturating_add(500) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> CycleConfig {
        CycleConfig {
            work_secs: 10,
            short_break_secs: 3,
            long_break_secs: 6,
            long_break_every: 4,
            near_end_secs: 2,
        }
    }

    #[test]
    fn countdown_is_anchor_based() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.start(0);
        // A single late tick catches up fully.
        assert!(cycle.tick(7_000).is_none());
        assert_eq!(cycle.seconds_remaining(), 3);
        assert_eq!(cycle.remaining_ms(7_250), 2_750);
    }

    #[test]
    fn near_end_fires_once() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.start(0);
        assert!(matches!(
            cycle.tick(8_000),
            Some(CycleSignal::NearEnd { seconds_remaining: 2, .. })
        ));
        assert!(cycle.tick(9_000).is_none());
    }

    #[test]
    fn completion_fires_exactly_once() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.start(1_000);
        let signal = cycle.tick(11_000);
        assert_eq!(
            signal,
            Some(CycleSignal::Completed(CompletedPhase {
                phase: Phase::Work,
                started_at_ms: 1_000,
                ended_at_ms: 11_000,
                duration_ms: 10_000,
            }))
        );
        assert!(cycle.completion_handled());
        assert!(!cycle.is_active());
        assert!(cycle.tick(12_000).is_none());
        assert!(cycle.complete(12_000).is_none());
    }

    #[test]
    fn complete_refuses_before_time_is_up() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.start(0);
        assert!(cycle.complete(5_000).is_none());
        assert!(cycle.is_active());
    }

    #[test]
    fn pause_freezes_remaining() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.start(0);
        assert!(cycle.pause(4_000).unwrap().is_some());
        assert_eq!(cycle.remaining_ms(100_000), 6_000);
        assert!(cycle.tick(100_000).is_none());
        assert!(cycle.pause(100_000).unwrap().is_none());

        cycle.start(200_000);
        assert_eq!(cycle.phase_started_epoch_ms(), Some(0));
        assert!(matches!(cycle.tick(206_000), Some(CycleSignal::Completed(_))));
    }

    #[test]
    fn breaks_cannot_be_paused() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.reset(Phase::ShortBreak);
        cycle.start(0);
        let err = cycle.pause(1_000).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidPhaseTransition {
                phase: Phase::ShortBreak,
                ..
            }
        ));
        assert!(cycle.is_active());
    }

    #[test]
    fn advance_follows_four_cycle_rule() {
        let mut cycle = FocusCycle::new(short_config());
        let mut breaks = Vec::new();
        for _ in 0..4 {
            breaks.push(cycle.advance());
            assert_eq!(cycle.advance(), Phase::Work);
        }
        assert_eq!(
            breaks,
            vec![
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::LongBreak
            ]
        );
        assert_eq!(cycle.cycle_count(), 4);
    }

    #[test]
    fn start_clears_completion_flag_for_next_phase() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.start(0);
        cycle.tick(10_000);
        cycle.advance();
        assert!(cycle.completion_handled());
        assert!(cycle.start(10_000).is_some());
        assert!(!cycle.completion_handled());
        assert_eq!(cycle.phase(), Phase::ShortBreak);
        assert_eq!(cycle.seconds_remaining(), 3);
    }

    #[test]
    fn elapsed_in_phase_tracks_pauses() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.start(0);
        cycle.pause(3_000).unwrap();
        cycle.start(50_000);
        assert_eq!(cycle.elapsed_in_phase_ms(52_000), 5_000);
    }

    #[test]
    fn set_config_only_touches_fresh_phase() {
        let mut cycle = FocusCycle::new(short_config());
        cycle.set_config(CycleConfig::default());
        assert_eq!(cycle.seconds_remaining(), 1500);

        cycle.start(0);
        cycle.pause(1_000).unwrap();
        cycle.set_config(short_config());
        assert_eq!(cycle.seconds_remaining(), 1499);
    }
}
