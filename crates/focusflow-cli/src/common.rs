//! Shared plumbing for commands: opening the tracker, prompting, printing.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing::debug;

use focusflow_core::{
    Config, Confirm, ConfirmPrompt, Database, Event, SystemClock, TracingNotifier, Tracker,
    TrackerSettings,
};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Everything a command needs: the config, the engine and a project store.
pub struct Session {
    pub config: Config,
    pub tracker: Tracker,
    pub projects_db: Database,
}

impl Session {
    pub fn open(user: Option<String>) -> CliResult<Self> {
        let config = Config::load()?;
        let user = user.unwrap_or_else(|| config.account.user.clone());
        debug!(user = %user, "opening session");

        let projects_db = Database::open()?;
        let projects = projects_db.load_projects(&user)?;

        let mut tracker = Tracker::open(
            user,
            TrackerSettings::from(&config),
            Arc::new(SystemClock),
            Box::new(Database::open()?),
        )?;
        if config.notifications.enabled {
            tracker = tracker.with_notifier(Box::new(TracingNotifier));
        }
        tracker.set_projects(projects)?;

        Ok(Self {
            config,
            tracker,
            projects_db,
        })
    }

    /// Write the tracker's hierarchy back to the project store.
    pub fn save_projects(&self) -> CliResult {
        self.projects_db
            .save_projects(self.tracker.user(), self.tracker.projects())?;
        Ok(())
    }

    pub fn close(self) -> CliResult {
        self.tracker.close()?;
        Ok(())
    }
}

/// Asks on stderr and reads the answer from stdin. `--yes` skips the question.
pub struct StdinConfirm {
    pub assume_yes: bool,
}

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{} [y/N] ", prompt.message());
        let _ = io::stderr().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// One JSON object per line on stdout.
pub fn print_events(events: &[Event]) -> CliResult {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for event in events {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
    }
    Ok(())
}
