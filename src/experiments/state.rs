//! # Experiment lifecycle state and step outcome.

use std::fmt;

/// Observable state of an experiment, as reported through
/// [`Experiment::on_state_changed`](crate::Experiment::on_state_changed) and
/// [`EventKind::StateChanged`](crate::EventKind::StateChanged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ExperimentState {
    /// Closed, or never opened.
    #[default]
    None = 0,
    /// Loading, building or reloading.
    NotReady = 1,
    /// Stepping continuously.
    Running = 2,
    /// Ready, waiting for Start or Step.
    Paused = 3,
}

impl ExperimentState {
    /// Returns a short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            ExperimentState::None => "none",
            ExperimentState::NotReady => "not_ready",
            ExperimentState::Running => "running",
            ExperimentState::Paused => "paused",
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ExperimentState::NotReady,
            2 => ExperimentState::Running,
            3 => ExperimentState::Paused,
            _ => ExperimentState::None,
        }
    }
}

impl fmt::Display for ExperimentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Result of advancing the simulation by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step completed; the simulation can keep going.
    Continue,
    /// The simulation will not continue (stop condition reached).
    Stop,
}

impl StepOutcome {
    /// True for [`StepOutcome::Continue`].
    #[inline]
    pub fn is_continue(&self) -> bool {
        matches!(self, StepOutcome::Continue)
    }
}
