//! Property tests for time accounting.

use std::sync::Arc;

use focusflow_core::timer::{Stopwatch, StopwatchState};
use focusflow_core::{
    ConfirmPrompt, Event, ManualClock, MemoryStore, NodeLevel, Project, Selection, Tracker,
    TrackerSettings,
};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Step {
    Start,
    Pause,
    Sample,
    Wait(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Start),
        Just(Step::Pause),
        Just(Step::Sample),
        (0u64..120_000).prop_map(Step::Wait),
    ]
}

proptest! {
    /// The committed duration is exactly the time spent running, however
    /// start, pause and sampling calls are interleaved.
    #[test]
    fn prop_end_session_equals_running_time(steps in prop::collection::vec(step(), 0..64)) {
        let mut stopwatch = Stopwatch::new();
        let mut now = 1_000_000u64;
        let mut running_ms = 0u64;
        let mut opened = false;

        for step in steps {
            match step {
                Step::Start => {
                    stopwatch.start(now);
                    opened = true;
                }
                Step::Pause => {
                    stopwatch.pause(now);
                }
                Step::Sample => {
                    stopwatch.sample(now);
                }
                Step::Wait(ms) => {
                    if stopwatch.state() == StopwatchState::Running {
                        running_ms += ms;
                    }
                    now += ms;
                }
            }
            prop_assert_eq!(stopwatch.elapsed_ms(now), running_ms);
        }

        let interval = stopwatch.end_session(now);
        prop_assert_eq!(interval.is_some(), opened);
        if let Some(interval) = interval {
            prop_assert_eq!(interval.duration_ms, running_ms);
            prop_assert!(interval.ended_at_ms - interval.started_at_ms >= interval.duration_ms);
        }
        prop_assert_eq!(stopwatch.state(), StopwatchState::Idle);
    }

    /// Every committed session adds to exactly one node, so the project's
    /// effective total always equals the sum of its history.
    #[test]
    fn prop_effective_total_matches_history(
        sessions in prop::collection::vec((0usize..3, 0u64..600_000), 1..20)
    ) {
        let projects: Vec<Project> = serde_json::from_str(
            r#"[{"id":"p","name":"P","subProjects":[
                {"id":"t","name":"T","subTopics":[{"id":"s","name":"S"}]}
            ]}]"#,
        ).unwrap();
        let clock = ManualClock::new(0);
        let mut tracker = Tracker::open(
            "prop",
            TrackerSettings::default(),
            Arc::new(clock.clone()),
            Box::new(MemoryStore::new()),
        ).unwrap();
        tracker.set_projects(projects.clone()).unwrap();

        let targets = [
            (None, None),
            (Some("t"), None),
            (Some("t"), Some("s")),
        ];
        for (target, ms) in sessions {
            let (topic, sub) = targets[target];
            let selection = Selection::resolve(&projects, "p", topic, sub).unwrap();
            tracker.select(selection, &mut |_: &ConfirmPrompt| true);
            tracker.start().unwrap();
            clock.advance(ms);
            let events = tracker.stop();
            let recorded = events.iter().any(|e| matches!(e, Event::SessionRecorded { .. }));
            prop_assert_eq!(recorded, ms >= 1_000);
        }

        let history_total: u64 = tracker.history().iter().map(|r| r.duration).sum();
        prop_assert_eq!(tracker.timers().project_time(&projects[0]), history_total);
        prop_assert_eq!(
            tracker.timers().own_time(NodeLevel::Subtopic, "s")
                + tracker.timers().own_time(NodeLevel::Topic, "t"),
            tracker.timers().topic_time(&projects[0].topics[0])
        );
    }
}
