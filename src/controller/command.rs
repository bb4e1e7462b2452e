//! # Commands exchanged between callers and the controller.
//!
//! A closed set of verbs. Each one is interpreted by the dispatcher (or in the
//! caller's task for synchronous submissions), never two at the same time.

use std::fmt;

/// Controller command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Build/load the experiment.
    Open,
    /// Run continuously.
    Start,
    /// Let exactly one step through, then stay paused.
    Step,
    /// Stop before the next step.
    Pause,
    /// Rebuild the experiment, resuming if it was running.
    Reload,
    /// Restore the previously recorded state.
    Back,
    /// Teardown marker; wakes the dispatcher so it can exit.
    Close,
}

impl Command {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Command::Open => "open",
            Command::Start => "start",
            Command::Step => "step",
            Command::Pause => "pause",
            Command::Reload => "reload",
            Command::Back => "back",
            Command::Close => "close",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
