use clap::{Subcommand, ValueEnum};
use focusflow_core::report::format_duration;
use focusflow_core::TimerMode;

use crate::common::{print_events, CliResult, Session, StdinConfirm};

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Stopwatch,
    FocusCycle,
}

impl From<ModeArg> for TimerMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Stopwatch => TimerMode::Stopwatch,
            ModeArg::FocusCycle => TimerMode::FocusCycle,
        }
    }
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume the live timer
    Start,
    /// Pause the live timer
    Pause,
    /// End the current session and record it
    Stop,
    /// Discard the current session without recording
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Switch between stopwatch and focus cycle
    Mode {
        mode: ModeArg,
        /// Don't ask before ending a running session
        #[arg(long, short)]
        yes: bool,
    },
}

pub fn run(action: TimerAction, user: Option<String>) -> CliResult {
    let mut session = Session::open(user)?;
    let tracker = &mut session.tracker;

    match action {
        TimerAction::Start => print_events(&tracker.start()?)?,
        TimerAction::Pause => print_events(&tracker.pause()?)?,
        TimerAction::Stop => print_events(&tracker.stop())?,
        TimerAction::Reset => print_events(&tracker.reset())?,
        TimerAction::Status => {
            let status = tracker.status();
            let mut json = serde_json::to_value(&status)?;
            json["elapsed"] = format_duration(status.elapsed_ms).into();
            json["remaining"] = format_duration(status.seconds_remaining * 1000).into();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        TimerAction::Mode { mode, yes } => {
            let mut confirm = StdinConfirm { assume_yes: yes };
            match tracker.set_mode(mode.into(), &mut confirm) {
                Some(events) => print_events(&events)?,
                None => eprintln!("cancelled"),
            }
        }
    }
    session.close()
}
