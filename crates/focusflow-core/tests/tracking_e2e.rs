//! End-to-end tracking scenarios through the public `Tracker` API.
//!
//! Every test runs against a `ManualClock`, so timings are exact.

use std::sync::Arc;

use focusflow_core::{
    ConfirmPrompt, CoreError, DiscardReason, Event, ManualClock, MemoryStore, NodeLevel, Phase,
    Project, SelectOutcome, Selection, SubTopic, TimerMode, Topic, Tracker, TrackerSettings,
};

const T0: u64 = 1_710_000_000_000;

// ============================================================================
// Test Helpers
// ============================================================================

fn hierarchy() -> Vec<Project> {
    vec![
        Project {
            id: "thesis".into(),
            name: "Thesis".into(),
            topics: vec![
                Topic {
                    id: "ch3".into(),
                    name: "Chapter 3".into(),
                    sub_topics: vec![SubTopic {
                        id: "methods".into(),
                        name: "Methods".into(),
                    }],
                },
                Topic {
                    id: "ch4".into(),
                    name: "Chapter 4".into(),
                    sub_topics: vec![],
                },
            ],
        },
        Project {
            id: "reading".into(),
            name: "Reading".into(),
            topics: vec![],
        },
    ]
}

fn open(clock: &ManualClock, store: &MemoryStore, settings: TrackerSettings) -> Tracker {
    let mut tracker = Tracker::open(
        "student",
        settings,
        Arc::new(clock.clone()),
        Box::new(store.clone()),
    )
    .unwrap();
    tracker.set_projects(hierarchy()).unwrap();
    tracker
}

fn select(tracker: &mut Tracker, project: &str, topic: Option<&str>, sub: Option<&str>) {
    let selection = Selection::resolve(tracker.projects(), project, topic, sub).unwrap();
    tracker.select(selection, &mut |_: &ConfirmPrompt| true);
}

fn yes(_: &ConfirmPrompt) -> bool {
    true
}

fn no(_: &ConfirmPrompt) -> bool {
    false
}

fn recorded(events: &[Event]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::SessionRecorded { record } => Some(record.duration),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Stopwatch
// ============================================================================

#[test]
fn pause_and_resume_bill_only_running_time() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());
    select(&mut tracker, "thesis", Some("ch3"), None);

    tracker.start().unwrap();
    clock.advance_secs(65);
    tracker.pause().unwrap();
    clock.advance_secs(600);
    tracker.start().unwrap();
    clock.advance_secs(5);
    let events = tracker.stop();

    assert_eq!(recorded(&events), vec![70_000]);
    assert_eq!(tracker.timers().own_time(NodeLevel::Topic, "ch3"), 70_000);
    assert_eq!(tracker.timers().own_time(NodeLevel::Project, "thesis"), 0);

    let record = &tracker.history()[0];
    assert_eq!(record.project_name, "Thesis");
    assert_eq!(record.topic_name.as_deref(), Some("Chapter 3"));
    assert_eq!(record.sub_topic_id, None);
    assert_eq!(record.level, NodeLevel::Topic);
    assert_eq!(record.start_time.timestamp_millis() as u64, T0);
    assert_eq!(record.end_time.timestamp_millis() as u64, T0 + 670_000);

    let projects = tracker.projects().to_vec();
    assert_eq!(tracker.timers().project_time(&projects[0]), 70_000);
}

#[test]
fn late_sampling_does_not_change_billed_time() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());
    select(&mut tracker, "reading", None, None);

    tracker.start().unwrap();
    for _ in 0..3 {
        clock.advance(1_250);
        tracker.tick();
    }
    // No samples at all for a long stretch.
    clock.advance_secs(3_600);
    let events = tracker.stop();
    assert_eq!(recorded(&events), vec![3_603_750]);
}

#[test]
fn history_is_most_recent_first() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());

    for (project, secs) in [("thesis", 10), ("reading", 20)] {
        select(&mut tracker, project, None, None);
        tracker.start().unwrap();
        clock.advance_secs(secs);
        tracker.stop();
    }

    let ids: Vec<_> = tracker
        .history()
        .iter()
        .map(|r| r.project_id.as_str())
        .collect();
    assert_eq!(ids, vec!["reading", "thesis"]);
}

// ============================================================================
// Focus cycle
// ============================================================================

#[test]
fn four_work_phases_then_long_break() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let settings = TrackerSettings {
        auto_advance: false,
        ..TrackerSettings::default()
    };
    let mut tracker = open(&clock, &store, settings);
    select(&mut tracker, "thesis", Some("ch3"), Some("methods"));
    tracker.set_mode(TimerMode::FocusCycle, &mut yes).unwrap();

    let mut breaks = Vec::new();
    for _ in 0..4 {
        tracker.start().unwrap();
        clock.advance_secs(25 * 60);
        let mut events = tracker.tick();
        // A duplicate completion callback must be a no-op.
        events.extend(tracker.handle_completion());
        assert_eq!(recorded(&events), vec![1_500_000]);

        breaks.push(tracker.cycle().phase());
        let break_secs = tracker.cycle().seconds_remaining();
        tracker.start().unwrap();
        clock.advance_secs(break_secs);
        let events = tracker.tick();
        assert!(recorded(&events).is_empty());
        assert_eq!(tracker.cycle().phase(), Phase::Work);
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
    assert_eq!(tracker.cycle().cycle_count(), 4);
    assert_eq!(tracker.history().len(), 4);
    assert_eq!(
        tracker.timers().own_time(NodeLevel::Subtopic, "methods"),
        4 * 1_500_000
    );
}

#[test]
fn auto_advance_starts_next_phase_after_delay() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());
    select(&mut tracker, "thesis", None, None);
    tracker.set_mode(TimerMode::FocusCycle, &mut yes).unwrap();

    tracker.start().unwrap();
    clock.advance_secs(25 * 60);
    tracker.tick();
    assert!(!tracker.is_active());

    clock.advance(1_000);
    assert!(tracker.tick().is_empty());
    clock.advance(500);
    let events = tracker.tick();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::PhaseStarted {
            phase: Phase::ShortBreak,
            resumed: false,
            ..
        }
    )));
    assert!(tracker.is_active());
}

#[test]
fn stopping_mid_work_bills_elapsed_part() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());
    select(&mut tracker, "reading", None, None);
    tracker.set_mode(TimerMode::FocusCycle, &mut yes).unwrap();

    tracker.start().unwrap();
    clock.advance_secs(600);
    tracker.pause().unwrap();
    clock.advance_secs(300);
    tracker.start().unwrap();
    clock.advance_secs(60);
    let events = tracker.stop();

    assert_eq!(recorded(&events), vec![660_000]);
    assert_eq!(tracker.cycle().phase(), Phase::Work);
    assert!(!tracker.cycle().in_progress());
}

#[test]
fn work_phase_stays_billed_to_its_starting_node() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let settings = TrackerSettings {
        auto_advance: false,
        ..TrackerSettings::default()
    };
    let mut tracker = open(&clock, &store, settings);
    select(&mut tracker, "thesis", None, None);
    tracker.set_mode(TimerMode::FocusCycle, &mut yes).unwrap();

    tracker.start().unwrap();
    clock.advance_secs(60);
    tracker.pause().unwrap();

    // Switching while paused ends the phase against the old node.
    select(&mut tracker, "reading", None, None);
    assert_eq!(tracker.timers().own_time(NodeLevel::Project, "thesis"), 60_000);
    assert_eq!(tracker.timers().own_time(NodeLevel::Project, "reading"), 0);
}

// ============================================================================
// Task switching
// ============================================================================

#[test]
fn confirmed_switch_commits_once_and_idles() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());
    select(&mut tracker, "thesis", Some("ch3"), None);
    tracker.start().unwrap();
    clock.advance_secs(120);

    let target = Selection::resolve(tracker.projects(), "thesis", Some("ch4"), None).unwrap();
    let SelectOutcome::Applied(events) = tracker.select(target, &mut yes) else {
        panic!("switch should apply");
    };

    assert_eq!(recorded(&events), vec![120_000]);
    assert_eq!(tracker.history().len(), 1);
    assert!(!tracker.is_active());
    assert_eq!(tracker.selection().unwrap().deepest_id(), "ch4");
}

#[test]
fn declined_switch_leaves_state_identical() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());
    select(&mut tracker, "thesis", Some("ch3"), None);
    tracker.start().unwrap();
    clock.advance_secs(120);

    let before = serde_json::to_value(tracker.snapshot()).unwrap();
    let target = Selection::resolve(tracker.projects(), "reading", None, None).unwrap();
    assert_eq!(tracker.select(target, &mut no), SelectOutcome::Declined);
    assert_eq!(serde_json::to_value(tracker.snapshot()).unwrap(), before);

    clock.advance_secs(30);
    assert_eq!(recorded(&tracker.stop()), vec![150_000]);
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn deleting_active_project_discards_interval_and_history() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());

    select(&mut tracker, "thesis", Some("ch3"), Some("methods"));
    tracker.start().unwrap();
    clock.advance_secs(30);
    tracker.stop();
    select(&mut tracker, "reading", None, None);
    tracker.start().unwrap();
    clock.advance_secs(10);
    tracker.stop();

    select(&mut tracker, "thesis", Some("ch3"), None);
    tracker.start().unwrap();
    clock.advance_secs(45);

    assert!(tracker.delete_node("thesis", &mut no).is_none());
    assert!(tracker.is_active());

    let events = tracker.delete_node("thesis", &mut yes).unwrap();
    assert!(events.contains(&Event::SessionDiscarded {
        reason: DiscardReason::NodeDeleted,
        duration_ms: 45_000,
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::NodeDeleted {
            level: Some(NodeLevel::Project),
            removed_sessions: 1,
            ..
        }
    )));
    assert!(tracker.selection().is_none());
    assert!(!tracker.is_active());
    assert!(tracker.timers().sub_topics.is_empty());
    assert_eq!(tracker.history().len(), 1);
    assert_eq!(tracker.history()[0].project_id, "reading");
    assert!(tracker.projects().iter().all(|p| p.id != "thesis"));
    assert!(matches!(tracker.start(), Err(CoreError::NoTaskSelected)));
}

#[test]
fn deleting_idle_node_only_cleans_ledger() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());

    select(&mut tracker, "thesis", Some("ch4"), None);
    tracker.start().unwrap();
    clock.advance_secs(30);
    tracker.stop();

    select(&mut tracker, "reading", None, None);
    tracker.start().unwrap();
    let events = tracker
        .delete_node("ch4", &mut |_: &ConfirmPrompt| -> bool {
            panic!("unrelated node must not prompt")
        })
        .unwrap();

    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::SessionDiscarded { .. })));
    assert!(tracker.is_active());
    assert_eq!(tracker.timers().own_time(NodeLevel::Topic, "ch4"), 0);
    assert!(tracker.history().is_empty());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn failed_writes_are_retried_by_later_mutations() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut tracker = open(&clock, &store, TrackerSettings::default());
    select(&mut tracker, "reading", None, None);

    store.set_fail_writes(true);
    tracker.start().unwrap();
    clock.advance_secs(10);
    tracker.stop();
    assert!(tracker.is_dirty());
    assert!(store.snapshot("student").unwrap().ledger.history.is_empty());

    store.set_fail_writes(false);
    tracker.start().unwrap();
    assert!(!tracker.is_dirty());
    assert_eq!(store.snapshot("student").unwrap().ledger.history.len(), 1);
}

#[test]
fn users_do_not_share_ledgers() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut alice = open(&clock, &store, TrackerSettings::default());
    select(&mut alice, "reading", None, None);
    alice.start().unwrap();
    clock.advance_secs(10);
    alice.stop();
    alice.close().unwrap();

    let bob = Tracker::open(
        "bob",
        TrackerSettings::default(),
        Arc::new(clock.clone()),
        Box::new(store.clone()),
    )
    .unwrap();
    assert!(bob.history().is_empty());
    assert!(bob.selection().is_none());
}
