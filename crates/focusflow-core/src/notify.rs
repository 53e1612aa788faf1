//! Audio / notification cues.
//!
//! The engine fires a cue at phase start, when a phase is about to end, and
//! at phase end. It never waits on the outcome.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::timer::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    Start,
    Countdown,
    End,
}

impl CueKind {
    /// Symbolic sound name.
    pub fn name(self) -> &'static str {
        match self {
            CueKind::Start => "start",
            CueKind::Countdown => "countdown",
            CueKind::End => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub kind: CueKind,
    pub phase: Phase,
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.name(), self.phase)
    }
}

pub trait Notifier: Send {
    fn cue(&self, cue: Cue);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn cue(&self, _cue: Cue) {}
}

/// Logs every cue; useful where no audio device exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn cue(&self, cue: Cue) {
        info!(cue = cue.kind.name(), phase = %cue.phase, "cue");
    }
}

impl<F> Notifier for F
where
    F: Fn(Cue) + Send,
{
    fn cue(&self, cue: Cue) {
        self(cue)
    }
}
