//! Error types used by the controller runtime and by experiments.
//!
//! This module defines three enums:
//!
//! - [`ExperimentError`]: errors raised by the simulation behind an [`Experiment`](crate::Experiment).
//! - [`SubmitError`]: why an asynchronous command submission was rejected.
//! - [`ControllerError`]: errors raised by the controller runtime itself.
//!
//! All of them provide `as_label` (stable snake_case, for logs/metrics) and the
//! first two provide `as_message` for human-readable output.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by an experiment.
///
/// Returned by the [`Experiment`](crate::Experiment) operations. The controller
/// routes them either to the failure path (open/reload/back) or treats them as a
/// step fault (step), see the crate docs.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    /// The simulation could not be built or loaded.
    #[error("build failed: {error}")]
    Build {
        /// The underlying error message.
        error: String,
    },

    /// A fault raised while running the simulation.
    #[error("runtime error: {error}")]
    Runtime {
        /// The underlying error message.
        error: String,
    },

    /// Experiment code panicked; the panic was caught by the controller.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ExperimentError {
    /// Shorthand for [`ExperimentError::Build`].
    pub fn build(error: impl Into<String>) -> Self {
        Self::Build {
            error: error.into(),
        }
    }

    /// Shorthand for [`ExperimentError::Runtime`].
    pub fn runtime(error: impl Into<String>) -> Self {
        Self::Runtime {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use simvisor::ExperimentError;
    ///
    /// let err = ExperimentError::build("missing species");
    /// assert_eq!(err.as_label(), "experiment_build");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExperimentError::Build { .. } => "experiment_build",
            ExperimentError::Runtime { .. } => "experiment_runtime",
            ExperimentError::Panicked { .. } => "experiment_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ExperimentError::Build { error } => format!("build: {error}"),
            ExperimentError::Runtime { error } => format!("runtime: {error}"),
            ExperimentError::Panicked { info } => format!("panic: {info}"),
        }
    }

    /// Builds a [`ExperimentError::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let info = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::Panicked { info }
    }
}

/// # Reasons an asynchronous submission was rejected.
///
/// Rejection is a normal outcome, not a fault: the public API reports it as `false`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Command queue is full.
    #[error("command queue full")]
    Full,

    /// Dispatcher is gone (controller disposed).
    #[error("command channel closed")]
    Closed,

    /// Controller teardown has begun.
    #[error("controller is disposing")]
    Disposing,
}

impl SubmitError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Full => "submit_full",
            SubmitError::Closed => "submit_closed",
            SubmitError::Disposing => "submit_disposing",
        }
    }

    /// Returns a human-readable message.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by the controller runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Loops did not stop within the grace period after disposal.
    #[error("teardown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the loops still running.
        stuck: Vec<&'static str>,
    },
}

impl ControllerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use simvisor::ControllerError;
    /// use std::time::Duration;
    ///
    /// let err = ControllerError::GraceExceeded { grace: Duration::from_secs(1), stuck: vec!["stepper"] };
    /// assert_eq!(err.as_label(), "controller_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControllerError::GraceExceeded { .. } => "controller_grace_exceeded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_rendered() {
        let err = ExperimentError::from_panic(Box::new("boom"));
        assert_eq!(
            err,
            ExperimentError::Panicked {
                info: "boom".into()
            }
        );

        let err = ExperimentError::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.as_message(), "panic: owned boom");

        let err = ExperimentError::from_panic(Box::new(42_u32));
        assert_eq!(err.as_label(), "experiment_panicked");
        assert_eq!(err.to_string(), "panicked: unknown panic");
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(ExperimentError::runtime("x").as_label(), "experiment_runtime");
        assert_eq!(SubmitError::Full.as_label(), "submit_full");
        assert_eq!(SubmitError::Disposing.to_string(), "controller is disposing");
    }
}
