use std::time::Duration;

use clap::{Subcommand, ValueEnum};
use focusflow_core::driver;
use focusflow_core::report::format_duration;
use focusflow_core::{Event, Phase, TimerMode};

use crate::common::{print_events, CliResult, Session};

#[derive(Clone, Copy, ValueEnum)]
pub enum PhaseArg {
    Work,
    ShortBreak,
    LongBreak,
}

impl From<PhaseArg> for Phase {
    fn from(phase: PhaseArg) -> Self {
        match phase {
            PhaseArg::Work => Phase::Work,
            PhaseArg::ShortBreak => Phase::ShortBreak,
            PhaseArg::LongBreak => Phase::LongBreak,
        }
    }
}

#[derive(Subcommand)]
pub enum CycleAction {
    /// Load a fresh phase, discarding the current one
    Reset {
        #[arg(value_enum, default_value = "work")]
        phase: PhaseArg,
    },
    /// Check whether the running phase has finished
    Tick,
    /// Run the focus cycle in the foreground, printing events as they happen
    Watch {
        /// Stop after this many completed phases
        #[arg(long, default_value = "1")]
        phases: u32,
    },
}

pub fn run(action: CycleAction, user: Option<String>) -> CliResult {
    let mut session = Session::open(user)?;
    if session.tracker.mode() != TimerMode::FocusCycle {
        return Err("not in focus-cycle mode; run `focusflow timer mode focus-cycle` first".into());
    }

    match action {
        CycleAction::Reset { phase } => {
            print_events(&session.tracker.reset_cycle(phase.into()))?;
            session.close()
        }
        CycleAction::Tick => {
            let mut events = session.tracker.tick();
            events.extend(session.tracker.handle_completion());
            print_events(&events)?;
            session.close()
        }
        CycleAction::Watch { phases } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(watch(session, phases))
        }
    }
}

async fn watch(session: Session, phases: u32) -> CliResult {
    let Session {
        config,
        tracker,
        projects_db,
    } = session;
    let tick_every = Duration::from_millis(config.display.sample_interval_ms.max(10));
    let (handle, mut events, task) = driver::spawn(tracker, tick_every);

    if !handle.status().await?.cycle_active {
        print_events(&handle.start().await?)?;
    }

    let mut completed = 0;
    let mut display = tokio::time::interval(Duration::from_secs(1));
    while completed < phases {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                eprintln!();
                print_events(std::slice::from_ref(&event))?;
                if matches!(event, Event::PhaseCompleted { .. }) {
                    completed += 1;
                }
            }
            _ = display.tick() => {
                let status = handle.status().await?;
                eprint!(
                    "\r{} {}  ",
                    status.phase.label(),
                    format_duration(status.seconds_remaining * 1000)
                );
            }
        }
    }
    eprintln!();

    handle.shutdown().await?;
    let tracker = task.await?;
    Session {
        config,
        tracker,
        projects_db,
    }
    .close()
}
