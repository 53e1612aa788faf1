//! The tracking engine: task selection, both timers, and session commits.
//!
//! A [`Tracker`] is an explicit instance owned by whoever drives it, built
//! when a user session starts and closed when it ends. Every operation reads
//! the clock once, mutates synchronously and returns the [`Event`]s it
//! produced; after each mutation the full ledger snapshot is written back to
//! the [`LedgerStore`].
//!
//! Only one timer is live at a time, chosen by [`TimerMode`]. Changing the
//! selected node or the mode while a timer runs needs a yes from a
//! [`Confirm`] capability; a "no" leaves every piece of state untouched.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{to_datetime, Clock};
use crate::error::{CoreError, ValidationError};
use crate::events::{DiscardReason, Event};
use crate::hierarchy::{find_node, validate_unique_ids, Project, Selection};
use crate::notify::{Cue, CueKind, NoopNotifier, Notifier};
use crate::recorder::{AggregateTimers, Interval, Ledger, SessionRecord, SessionRecorder};
use crate::storage::{Config, LedgerSnapshot, LedgerStore, LiveState};
use crate::timer::{
    CompletedPhase, CycleConfig, CycleSignal, FocusCycle, Phase, Stopwatch, StopwatchState,
    TimerMode,
};

/// Engine knobs, usually derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub cycle: CycleConfig,
    pub min_session_ms: u64,
    pub auto_advance: bool,
    /// Pause between a finished phase and the automatic start of the next.
    pub auto_advance_delay_ms: u64,
    pub notifications: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        TrackerSettings::from(&Config::default())
    }
}

impl From<&Config> for TrackerSettings {
    fn from(config: &Config) -> Self {
        Self {
            cycle: config.cycle_config(),
            min_session_ms: config.session.min_session_ms,
            auto_advance: config.cycle.auto_advance,
            auto_advance_delay_ms: config.cycle.auto_advance_delay_ms,
            notifications: config.notifications.enabled,
        }
    }
}

/// A destructive action waiting for a yes/no.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmPrompt {
    SwitchTask { from: Selection, to: Selection },
    SwitchMode { from: TimerMode, to: TimerMode },
    DeleteActiveNode { node_id: String },
    ClearHistory { sessions: usize },
}

impl ConfirmPrompt {
    pub fn message(&self) -> String {
        match self {
            ConfirmPrompt::SwitchTask { from, to } => format!(
                "A session for '{from}' is running. End it and switch to '{to}'?"
            ),
            ConfirmPrompt::SwitchMode { from, to } => {
                format!("A {from:?} session is running. End it and switch to {to:?}?")
            }
            ConfirmPrompt::DeleteActiveNode { node_id } => format!(
                "'{node_id}' owns the running session. Delete it and discard that time?"
            ),
            ConfirmPrompt::ClearHistory { sessions } => {
                format!("Clear all {sessions} recorded sessions? This cannot be undone.")
            }
        }
    }
}

/// Yes/no capability handed to destructive operations.
pub trait Confirm {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&ConfirmPrompt) -> bool,
{
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool {
        self(prompt)
    }
}

/// What applying a selection would do, decided without touching state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectPlan {
    /// The same node is already selected.
    Unchanged,
    /// Safe to apply right away.
    Apply,
    /// A running timer would be ended; ask first.
    NeedsConfirmation(ConfirmPrompt),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    Applied(Vec<Event>),
    Unchanged,
    Declined,
}

/// Point-in-time view for front ends.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub user: String,
    pub mode: TimerMode,
    pub selection: Option<Selection>,
    pub stopwatch: StopwatchState,
    pub elapsed_ms: u64,
    pub phase: Phase,
    pub cycle_active: bool,
    pub seconds_remaining: u64,
    pub cycle_count: u32,
    pub sessions: usize,
    pub unsaved: bool,
}

pub struct Tracker {
    user: String,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,
    recorder: SessionRecorder,
    store: Box<dyn LedgerStore>,
    notifier: Box<dyn Notifier>,
    projects: Vec<Project>,
    ledger: Ledger,
    mode: TimerMode,
    selection: Option<Selection>,
    stopwatch: Stopwatch,
    cycle: FocusCycle,
    cycle_attribution: Option<Selection>,
    auto_start_at_ms: Option<u64>,
    dirty: bool,
}

impl Tracker {
    /// Load `user`'s snapshot and build a ready engine.
    pub fn open(
        user: impl Into<String>,
        settings: TrackerSettings,
        clock: Arc<dyn Clock>,
        store: Box<dyn LedgerStore>,
    ) -> Result<Self, CoreError> {
        let user = user.into();
        let LedgerSnapshot { ledger, mode, live } = store.load(&user)?;

        let mut cycle = live
            .cycle
            .unwrap_or_else(|| FocusCycle::new(settings.cycle));
        cycle.set_config(settings.cycle);

        info!(
            user = %user,
            sessions = ledger.history.len(),
            mode = ?mode,
            "tracker ready"
        );

        Ok(Self {
            user,
            clock,
            settings,
            recorder: SessionRecorder::new(settings.min_session_ms),
            store,
            notifier: Box::new(NoopNotifier),
            projects: Vec::new(),
            ledger,
            mode,
            selection: live.selection,
            stopwatch: live.stopwatch,
            cycle,
            cycle_attribution: live.cycle_attribution,
            auto_start_at_ms: live.auto_start_at_ms,
            dirty: false,
        })
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn timers(&self) -> &AggregateTimers {
        &self.ledger.timers
    }

    pub fn history(&self) -> &[SessionRecord] {
        &self.ledger.history
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn cycle(&self) -> &FocusCycle {
        &self.cycle
    }

    /// True when the last write to the store failed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the live timer is counting right now.
    pub fn is_active(&self) -> bool {
        match self.mode {
            TimerMode::Stopwatch => self.stopwatch.is_running(),
            TimerMode::FocusCycle => self.cycle.is_active(),
        }
    }

    /// Whether the live timer holds time that a stop would commit.
    pub fn has_open_interval(&self) -> bool {
        match self.mode {
            TimerMode::Stopwatch => self.stopwatch.has_interval(),
            TimerMode::FocusCycle => self.cycle.in_progress(),
        }
    }

    pub fn status(&self) -> Status {
        let now = self.clock.now_ms();
        Status {
            user: self.user.clone(),
            mode: self.mode,
            selection: self.selection.clone(),
            stopwatch: self.stopwatch.state(),
            elapsed_ms: self.stopwatch.elapsed_ms(now),
            phase: self.cycle.phase(),
            cycle_active: self.cycle.is_active(),
            seconds_remaining: self.cycle.seconds_remaining_at(now),
            cycle_count: self.cycle.cycle_count(),
            sessions: self.ledger.history.len(),
            unsaved: self.dirty,
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            ledger: self.ledger.clone(),
            mode: self.mode,
            live: LiveState {
                selection: self.selection.clone(),
                stopwatch: self.stopwatch.clone(),
                cycle: Some(self.cycle.clone()),
                cycle_attribution: self.cycle_attribution.clone(),
                auto_start_at_ms: self.auto_start_at_ms,
            },
        }
    }

    // ── Hierarchy ────────────────────────────────────────────────────

    /// Replace the hierarchy snapshot supplied by the project store.
    ///
    /// Nodes the new hierarchy no longer has go through [`Self::on_node_deleted`]
    /// against the old tree first, so their whole subtree is cleaned.
    pub fn set_projects(&mut self, projects: Vec<Project>) -> Result<Vec<Event>, ValidationError> {
        validate_unique_ids(&projects)?;
        let mut events = Vec::new();
        for node_id in removed_roots(&self.projects, &projects) {
            events.extend(self.on_node_deleted(&node_id));
        }
        self.projects = projects;
        Ok(events)
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Refuse to start without a selected project.
    pub fn require_selection(&self) -> Result<&Selection, CoreError> {
        self.selection.as_ref().ok_or(CoreError::NoTaskSelected)
    }

    pub fn plan_select(&self, to: &Selection) -> SelectPlan {
        match &self.selection {
            Some(current) if current.same_node(to) => SelectPlan::Unchanged,
            Some(current) if self.is_active() => {
                SelectPlan::NeedsConfirmation(ConfirmPrompt::SwitchTask {
                    from: current.clone(),
                    to: to.clone(),
                })
            }
            _ => SelectPlan::Apply,
        }
    }

    /// Make `to` the selection, ending any open interval on the old node.
    ///
    /// Callers that planned a [`SelectPlan::NeedsConfirmation`] must only
    /// call this after a yes.
    pub fn apply_select(&mut self, to: Selection) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        let switching = self
            .selection
            .as_ref()
            .map_or(true, |current| !current.same_node(&to));
        if switching {
            self.finish_all(now, &mut events);
        }
        info!(selection = %to, "task selected");
        self.selection = Some(to);
        events.push(Event::SelectionChanged {
            selection: self.selection.clone(),
        });
        self.persist(&mut events);
        events
    }

    pub fn select(&mut self, to: Selection, confirm: &mut impl Confirm) -> SelectOutcome {
        match self.plan_select(&to) {
            SelectPlan::Unchanged => SelectOutcome::Unchanged,
            SelectPlan::Apply => SelectOutcome::Applied(self.apply_select(to)),
            SelectPlan::NeedsConfirmation(prompt) => {
                if confirm.confirm(&prompt) {
                    SelectOutcome::Applied(self.apply_select(to))
                } else {
                    debug!("task switch declined");
                    SelectOutcome::Declined
                }
            }
        }
    }

    /// Switch between stopwatch and focus cycle.
    ///
    /// Returns `None` if the user declined ending a running timer.
    pub fn set_mode(&mut self, mode: TimerMode, confirm: &mut impl Confirm) -> Option<Vec<Event>> {
        if mode == self.mode {
            return Some(Vec::new());
        }
        if self.is_active()
            && !confirm.confirm(&ConfirmPrompt::SwitchMode {
                from: self.mode,
                to: mode,
            })
        {
            return None;
        }
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        self.finish_all(now, &mut events);
        self.mode = mode;
        events.push(Event::ModeChanged { mode });
        self.persist(&mut events);
        Some(events)
    }

    // ── Timer commands ───────────────────────────────────────────────

    pub fn start(&mut self) -> Result<Vec<Event>, CoreError> {
        self.require_selection()?;
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        match self.mode {
            TimerMode::Stopwatch => events.extend(self.stopwatch.start(now)),
            TimerMode::FocusCycle => {
                self.auto_start_at_ms = None;
                self.start_phase(now, &mut events);
            }
        }
        if !events.is_empty() {
            self.persist(&mut events);
        }
        Ok(events)
    }

    /// Pause the live timer. Breaks of the focus cycle cannot be paused.
    pub fn pause(&mut self) -> Result<Vec<Event>, CoreError> {
        let now = self.clock.now_ms();
        let mut events: Vec<Event> = match self.mode {
            TimerMode::Stopwatch => self.stopwatch.pause(now).into_iter().collect(),
            TimerMode::FocusCycle => self
                .cycle
                .pause(now)
                .inspect_err(|e| warn!(error = %e, "pause refused"))?
                .into_iter()
                .collect(),
        };
        if !events.is_empty() {
            self.persist(&mut events);
        }
        Ok(events)
    }

    /// End the live interval and commit what it measured.
    pub fn stop(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        match self.mode {
            TimerMode::Stopwatch => self.finish_stopwatch(now, true, &mut events),
            TimerMode::FocusCycle => self.finish_cycle(now, true, &mut events),
        }
        if !events.is_empty() {
            self.persist(&mut events);
        }
        events
    }

    /// Throw away the live interval. Nothing is committed.
    pub fn reset(&mut self) -> Vec<Event> {
        match self.mode {
            TimerMode::Stopwatch => {
                let mut events: Vec<Event> = self.stopwatch.reset().into_iter().collect();
                if !events.is_empty() {
                    self.persist(&mut events);
                }
                events
            }
            TimerMode::FocusCycle => self.reset_cycle(Phase::Work),
        }
    }

    /// Load a fresh `phase` into the focus cycle, discarding the current one.
    pub fn reset_cycle(&mut self, phase: Phase) -> Vec<Event> {
        self.cycle_attribution = None;
        self.auto_start_at_ms = None;
        let mut events = vec![self.cycle.reset(phase)];
        self.persist(&mut events);
        events
    }

    /// Periodic wake-up. Safe to call at any rate, or late.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        match self.mode {
            TimerMode::Stopwatch => {
                self.stopwatch.sample(now);
            }
            TimerMode::FocusCycle => {
                match self.cycle.tick(now) {
                    Some(CycleSignal::NearEnd {
                        phase,
                        seconds_remaining,
                    }) => {
                        debug!(%phase, seconds_remaining, "phase near end");
                        self.cue(CueKind::Countdown, phase);
                        events.push(Event::PhaseNearEnd {
                            phase,
                            seconds_remaining,
                        });
                    }
                    Some(CycleSignal::Completed(done)) => {
                        self.on_phase_completed(done, now, &mut events)
                    }
                    None => {}
                }
                self.maybe_auto_start(now, &mut events);
            }
        }
        if !events.is_empty() {
            self.persist(&mut events);
        }
        events
    }

    /// Completion callback for the focus cycle. Fires at most once per phase
    /// however often it is invoked.
    pub fn handle_completion(&mut self) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();
        if let Some(done) = self.cycle.complete(now) {
            self.on_phase_completed(done, now, &mut events);
            self.maybe_auto_start(now, &mut events);
            self.persist(&mut events);
        }
        events
    }

    // ── Deletion and history ─────────────────────────────────────────

    /// React to a node removed by the project store.
    ///
    /// The node's time and history go with it. If the open interval belongs
    /// to the node it is discarded and the selection is cleared.
    pub fn on_node_deleted(&mut self, node_id: &str) -> Vec<Event> {
        let now = self.clock.now_ms();
        let mut events = Vec::new();

        let location = find_node(&self.projects, node_id);
        let level = location.map(|loc| loc.level());
        let removed_sessions = self.ledger.remove_node(location, node_id);

        let owns_selection = self
            .selection
            .as_ref()
            .is_some_and(|s| s.contains(node_id));
        let owns_cycle = self
            .cycle_attribution
            .as_ref()
            .is_some_and(|s| s.contains(node_id));

        if owns_selection || owns_cycle {
            self.finish_all_discarding(now, &mut events);
        }
        if owns_selection {
            self.selection = None;
            events.push(Event::SelectionChanged { selection: None });
        }

        prune_node(&mut self.projects, node_id);
        info!(node_id, removed_sessions, "node deleted");
        events.push(Event::NodeDeleted {
            node_id: node_id.to_string(),
            level,
            removed_sessions,
        });
        self.persist(&mut events);
        events
    }

    /// Delete a node on the user's behalf, asking first if it owns the open
    /// interval. Returns `None` when declined.
    pub fn delete_node(&mut self, node_id: &str, confirm: &mut impl Confirm) -> Option<Vec<Event>> {
        let owns_open_interval = self.has_open_interval()
            && self
                .selection
                .as_ref()
                .is_some_and(|s| s.contains(node_id));
        if owns_open_interval
            && !confirm.confirm(&ConfirmPrompt::DeleteActiveNode {
                node_id: node_id.to_string(),
            })
        {
            return None;
        }
        Some(self.on_node_deleted(node_id))
    }

    /// Drop every history record. Aggregate totals are kept.
    pub fn clear_history(&mut self, confirm: &mut impl Confirm) -> Option<Vec<Event>> {
        let sessions = self.ledger.history.len();
        if sessions > 0 && !confirm.confirm(&ConfirmPrompt::ClearHistory { sessions }) {
            return None;
        }
        let removed_sessions = self.ledger.clear_history();
        let mut events = vec![Event::HistoryCleared { removed_sessions }];
        self.persist(&mut events);
        Some(events)
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Retry writing the current state.
    pub fn flush(&mut self) -> Result<(), CoreError> {
        let snapshot = self.snapshot();
        self.store
            .save(&self.user, &snapshot)
            .map_err(CoreError::PersistenceWriteFailure)?;
        self.dirty = false;
        Ok(())
    }

    /// End of the user session: write everything back one last time.
    pub fn close(mut self) -> Result<(), CoreError> {
        self.flush()?;
        info!(user = %self.user, "tracker closed");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn persist(&mut self, events: &mut Vec<Event>) {
        let snapshot = self.snapshot();
        match self.store.save(&self.user, &snapshot) {
            Ok(()) => self.dirty = false,
            Err(e) => {
                warn!(error = %e, "persisting ledger failed; keeping in-memory state");
                self.dirty = true;
                events.push(Event::PersistenceFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    fn cue(&self, kind: CueKind, phase: Phase) {
        if self.settings.notifications {
            self.notifier.cue(Cue { kind, phase });
        }
    }

    fn commit(&mut self, interval: Interval, selection: Option<Selection>, events: &mut Vec<Event>) {
        match self
            .recorder
            .commit(&mut self.ledger, &interval, selection.as_ref())
        {
            Ok(record) => events.push(Event::SessionRecorded { record }),
            Err(CoreError::SessionTooShort { duration_ms, .. }) => {
                debug!(duration_ms, "session too short, discarded");
                events.push(Event::SessionDiscarded {
                    reason: DiscardReason::TooShort,
                    duration_ms,
                });
            }
            Err(e) => {
                warn!(error = %e, "session not recorded");
                events.push(Event::SessionDiscarded {
                    reason: DiscardReason::NoSelection,
                    duration_ms: interval.duration_ms,
                });
            }
        }
    }

    fn start_phase(&mut self, now: u64, events: &mut Vec<Event>) {
        let Some(event) = self.cycle.start(now) else {
            return;
        };
        if let Event::PhaseStarted {
            phase,
            resumed: false,
            ..
        } = event
        {
            if phase == Phase::Work {
                self.cycle_attribution = self.selection.clone();
            }
            self.cue(CueKind::Start, phase);
        }
        events.push(event);
    }

    fn on_phase_completed(&mut self, done: CompletedPhase, now: u64, events: &mut Vec<Event>) {
        self.cue(CueKind::End, done.phase);
        if done.phase == Phase::Work {
            let attribution = self
                .cycle_attribution
                .take()
                .or_else(|| self.selection.clone());
            let interval = Interval {
                started_at_ms: done.started_at_ms,
                ended_at_ms: done.ended_at_ms,
                duration_ms: done.duration_ms,
            };
            self.commit(interval, attribution, events);
        }
        let next_phase = self.cycle.advance();
        info!(
            completed = %done.phase,
            next = %next_phase,
            cycles = self.cycle.cycle_count(),
            "phase completed"
        );
        events.push(Event::PhaseCompleted {
            phase: done.phase,
            cycle_count: self.cycle.cycle_count(),
            next_phase,
            at: to_datetime(now),
        });
        if self.settings.auto_advance {
            self.auto_start_at_ms = Some(now.saturating_add(self.settings.auto_advance_delay_ms));
        }
    }

    fn maybe_auto_start(&mut self, now: u64, events: &mut Vec<Event>) {
        match self.auto_start_at_ms {
            Some(at) if now >= at => {
                self.auto_start_at_ms = None;
                if self.selection.is_some() {
                    self.start_phase(now, events);
                }
            }
            _ => {}
        }
    }

    fn finish_stopwatch(&mut self, now: u64, commit: bool, events: &mut Vec<Event>) {
        let Some(interval) = self.stopwatch.end_session(now) else {
            return;
        };
        if commit {
            let selection = self.selection.clone();
            self.commit(interval, selection, events);
        } else {
            events.push(Event::SessionDiscarded {
                reason: DiscardReason::NodeDeleted,
                duration_ms: interval.duration_ms,
            });
        }
    }

    /// Stop the focus cycle mid-phase. A work phase is worth the time it
    /// actually ran; breaks are worth nothing.
    fn finish_cycle(&mut self, now: u64, commit: bool, events: &mut Vec<Event>) {
        if !self.cycle.in_progress() {
            self.cycle_attribution = None;
            self.auto_start_at_ms = None;
            return;
        }
        let phase = self.cycle.phase();
        let interval = Interval {
            started_at_ms: self.cycle.phase_started_epoch_ms().unwrap_or(now),
            ended_at_ms: now,
            duration_ms: self.cycle.elapsed_in_phase_ms(now),
        };
        let attribution = self
            .cycle_attribution
            .take()
            .or_else(|| self.selection.clone());
        match (phase, commit) {
            (Phase::Work, true) => self.commit(interval, attribution, events),
            (Phase::Work, false) => events.push(Event::SessionDiscarded {
                reason: DiscardReason::NodeDeleted,
                duration_ms: interval.duration_ms,
            }),
            _ => events.push(Event::SessionDiscarded {
                reason: DiscardReason::BreakPhase,
                duration_ms: interval.duration_ms,
            }),
        }
        self.auto_start_at_ms = None;
        events.push(self.cycle.reset(Phase::Work));
    }

    fn finish_all(&mut self, now: u64, events: &mut Vec<Event>) {
        self.finish_stopwatch(now, true, events);
        self.finish_cycle(now, true, events);
    }

    fn finish_all_discarding(&mut self, now: u64, events: &mut Vec<Event>) {
        self.finish_stopwatch(now, false, events);
        self.finish_cycle(now, false, events);
    }
}

/// Remove the node with `id` from wherever it sits in the hierarchy.
fn prune_node(projects: &mut Vec<Project>, id: &str) {
    projects.retain(|p| p.id != id);
    for project in projects.iter_mut() {
        project.topics.retain(|t| t.id != id);
        for topic in project.topics.iter_mut() {
            topic.sub_topics.retain(|s| s.id != id);
        }
    }
}

/// Ids present in `old` but not in `new`. Descendants of a removed node are
/// left out; deleting the node covers them.
fn removed_roots(old: &[Project], new: &[Project]) -> Vec<String> {
    let gone = |id: &str| find_node(new, id).is_none();
    let mut removed = Vec::new();
    for project in old {
        if gone(&project.id) {
            removed.push(project.id.clone());
            continue;
        }
        for topic in &project.topics {
            if gone(&topic.id) {
                removed.push(topic.id.clone());
                continue;
            }
            removed.extend(
                topic
                    .sub_topics
                    .iter()
                    .filter(|s| gone(&s.id))
                    .map(|s| s.id.clone()),
            );
        }
    }
    removed
}
