mod focus_cycle;
mod phase;
mod stopwatch;

use serde::{Deserialize, Serialize};

pub use focus_cycle::{CompletedPhase, CycleSignal, FocusCycle};
pub use phase::{CycleConfig, Phase};
pub use stopwatch::{Stopwatch, StopwatchState};

/// Which timer the user is driving. Only one is live at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Stopwatch,
    FocusCycle,
}
