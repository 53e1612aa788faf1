//! Async single-owner driver.
//!
//! One tokio task owns the [`Tracker`]. Front ends talk to it through a
//! cloneable [`TrackerHandle`]; every command is a message with a oneshot
//! reply, and a periodic interval wakes the task to call `tick`. Since only
//! that task touches the tracker, a commit can never interleave with
//! another command.
//!
//! Confirmation is split across the channel: callers `plan_select`, ask
//! the user however they like, and then `apply_select` only on a yes.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::events::Event;
use crate::hierarchy::Selection;
use crate::timer::TimerMode;
use crate::tracker::{ConfirmPrompt, SelectPlan, Status, Tracker};

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Start(Reply<Result<Vec<Event>, CoreError>>),
    Pause(Reply<Result<Vec<Event>, CoreError>>),
    Stop(Reply<Vec<Event>>),
    Reset(Reply<Vec<Event>>),
    PlanSelect(Selection, Reply<SelectPlan>),
    ApplySelect(Selection, Reply<Vec<Event>>),
    SetMode {
        mode: TimerMode,
        confirmed: bool,
        reply: Reply<Option<Vec<Event>>>,
    },
    Status(Reply<Status>),
    Shutdown,
}

/// Cloneable sender side of the driver.
#[derive(Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<Command>,
}

impl TrackerHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CoreError::TrackerStopped)?;
        rx.await.map_err(|_| CoreError::TrackerStopped)
    }

    pub async fn start(&self) -> Result<Vec<Event>, CoreError> {
        self.request(Command::Start).await?
    }

    pub async fn pause(&self) -> Result<Vec<Event>, CoreError> {
        self.request(Command::Pause).await?
    }

    pub async fn stop(&self) -> Result<Vec<Event>, CoreError> {
        self.request(Command::Stop).await
    }

    pub async fn reset(&self) -> Result<Vec<Event>, CoreError> {
        self.request(Command::Reset).await
    }

    pub async fn plan_select(&self, selection: Selection) -> Result<SelectPlan, CoreError> {
        self.request(|reply| Command::PlanSelect(selection, reply))
            .await
    }

    pub async fn apply_select(&self, selection: Selection) -> Result<Vec<Event>, CoreError> {
        self.request(|reply| Command::ApplySelect(selection, reply))
            .await
    }

    /// `confirmed` answers the prompt a running timer would raise.
    pub async fn set_mode(
        &self,
        mode: TimerMode,
        confirmed: bool,
    ) -> Result<Option<Vec<Event>>, CoreError> {
        self.request(|reply| Command::SetMode {
            mode,
            confirmed,
            reply,
        })
        .await
    }

    pub async fn status(&self) -> Result<Status, CoreError> {
        self.request(Command::Status).await
    }

    /// Ask the task to stop. The join handle then yields the tracker.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| CoreError::TrackerStopped)
    }
}

/// Move `tracker` onto a new task that ticks every `tick_every`.
///
/// Returns the command handle, the stream of every event the tracker
/// produced, and the task's join handle, which hands the tracker back once
/// the task stops (after a shutdown or once every handle is dropped).
pub fn spawn(
    mut tracker: Tracker,
    tick_every: Duration,
) -> (
    TrackerHandle,
    mpsc::UnboundedReceiver<Event>,
    JoinHandle<Tracker>,
) {
    let (tx, mut rx) = mpsc::channel::<Command>(32);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let forward = |events: &[Event]| {
            for event in events {
                // Nobody listening is fine.
                let _ = events_tx.send(event.clone());
            }
        };

        info!(user = tracker.user(), "tracker task started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let events = tracker.tick();
                    forward(&events);
                }
                command = rx.recv() => {
                    let Some(command) = command else {
                        debug!("all handles dropped");
                        break;
                    };
                    match command {
                        Command::Start(reply) => {
                            let result = tracker.start();
                            if let Ok(events) = &result {
                                forward(events);
                            }
                            let _ = reply.send(result);
                        }
                        Command::Pause(reply) => {
                            let result = tracker.pause();
                            if let Ok(events) = &result {
                                forward(events);
                            }
                            let _ = reply.send(result);
                        }
                        Command::Stop(reply) => {
                            let events = tracker.stop();
                            forward(&events);
                            let _ = reply.send(events);
                        }
                        Command::Reset(reply) => {
                            let events = tracker.reset();
                            forward(&events);
                            let _ = reply.send(events);
                        }
                        Command::PlanSelect(selection, reply) => {
                            let _ = reply.send(tracker.plan_select(&selection));
                        }
                        Command::ApplySelect(selection, reply) => {
                            let events = tracker.apply_select(selection);
                            forward(&events);
                            let _ = reply.send(events);
                        }
                        Command::SetMode { mode, confirmed, reply } => {
                            let result = tracker.set_mode(mode, &mut |_: &ConfirmPrompt| confirmed);
                            if let Some(events) = &result {
                                forward(events);
                            }
                            let _ = reply.send(result);
                        }
                        Command::Status(reply) => {
                            let _ = reply.send(tracker.status());
                        }
                        Command::Shutdown => break,
                    }
                }
            }
        }

        if let Err(e) = tracker.flush() {
            warn!(error = %e, "final flush failed");
        }
        info!("tracker task stopped");
        tracker
    });

    (TrackerHandle { tx }, events_rx, task)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::hierarchy::Project;
    use crate::storage::MemoryStore;
    use crate::tracker::TrackerSettings;

    fn tracker(clock: &ManualClock) -> Tracker {
        let mut tracker = Tracker::open(
            "tester",
            TrackerSettings::default(),
            Arc::new(clock.clone()),
            Box::new(MemoryStore::new()),
        )
        .unwrap();
        tracker
            .set_projects(vec![Project {
                id: "p1".into(),
                name: "Thesis".into(),
                topics: vec![],
            }])
            .unwrap();
        tracker
    }

    #[tokio::test]
    async fn commands_round_trip_through_the_task() {
        let clock = ManualClock::new(1_700_000_000_000);
        let t = tracker(&clock);
        let selection = Selection::resolve(t.projects(), "p1", None, None).unwrap();
        let (handle, mut events, task) = spawn(t, Duration::from_millis(5));

        assert!(matches!(
            handle.start().await,
            Err(CoreError::NoTaskSelected)
        ));
        assert_eq!(
            handle.plan_select(selection.clone()).await.unwrap(),
            SelectPlan::Apply
        );
        handle.apply_select(selection).await.unwrap();
        handle.start().await.unwrap();
        clock.advance_secs(42);
        let stopped = handle.stop().await.unwrap();
        assert!(matches!(
            &stopped[0],
            Event::SessionRecorded { record } if record.duration == 42_000
        ));

        handle.shutdown().await.unwrap();
        let tracker = task.await.unwrap();
        assert_eq!(tracker.history().len(), 1);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen
            .iter()
            .any(|e| matches!(e, Event::StopwatchStarted { .. })));
        assert!(seen
            .iter()
            .any(|e| matches!(e, Event::SessionRecorded { .. })));
    }

    #[tokio::test]
    async fn ticks_complete_focus_phases() {
        let clock = ManualClock::new(0);
        let mut t = tracker(&clock);
        let selection = Selection::resolve(t.projects(), "p1", None, None).unwrap();
        t.apply_select(selection);
        let (handle, mut events, task) = spawn(t, Duration::from_millis(5));

        handle.set_mode(TimerMode::FocusCycle, true).await.unwrap();
        handle.start().await.unwrap();
        clock.advance_secs(25 * 60);

        let recorded = loop {
            match events.recv().await {
                Some(Event::SessionRecorded { record }) => break record,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        };
        assert_eq!(recorded.duration, 1_500_000);

        handle.shutdown().await.unwrap();
        let tracker = task.await.unwrap();
        assert_eq!(tracker.cycle().cycle_count(), 1);
    }

    #[tokio::test]
    async fn handle_reports_stopped_task() {
        let clock = ManualClock::new(0);
        let (handle, _events, task) = spawn(tracker(&clock), Duration::from_millis(50));
        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(matches!(
            handle.status().await,
            Err(CoreError::TrackerStopped)
        ));
    }
}
