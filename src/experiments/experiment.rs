//! # Experiment trait: the simulation seen from the controller.
//!
//! The controller never looks inside a simulation. Everything it needs (build,
//! advance one step, step back through recorded history, reload, observability
//! and failure hooks) goes through [`Experiment`].
//!
//! Methods are async. A step that is CPU heavy should move its work off the
//! async workers (e.g. `tokio::task::spawn_blocking`) so the dispatcher stays
//! responsive while the simulation runs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ExperimentError;
use crate::experiments::{ExperimentState, StepOutcome};

/// Shared handle to an experiment.
pub type ExperimentRef = Arc<dyn Experiment>;

/// # A steppable simulation driven by a controller.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use async_trait::async_trait;
/// use simvisor::{Experiment, ExperimentError, StepOutcome};
///
/// struct Countdown {
///     left: AtomicU64,
/// }
///
/// #[async_trait]
/// impl Experiment for Countdown {
///     fn name(&self) -> &str { "countdown" }
///
///     async fn open(&self) -> Result<(), ExperimentError> { Ok(()) }
///
///     async fn step(&self) -> Result<StepOutcome, ExperimentError> {
///         let left = self.left.fetch_sub(1, Ordering::SeqCst);
///         Ok(if left > 1 { StepOutcome::Continue } else { StepOutcome::Stop })
///     }
///
///     async fn reload(&self) -> Result<(), ExperimentError> {
///         self.left.store(10, Ordering::SeqCst);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Experiment: Send + Sync + 'static {
    /// Stable, human-readable experiment name (used in logs and events).
    fn name(&self) -> &str;

    /// Loads/builds the first runnable simulation.
    async fn open(&self) -> Result<(), ExperimentError>;

    /// Runs one simulation tick.
    ///
    /// [`StepOutcome::Stop`] means the simulation reached its stop condition.
    async fn step(&self) -> Result<StepOutcome, ExperimentError>;

    /// Restores the previously recorded state.
    ///
    /// The default does nothing, for experiments that record no history.
    async fn step_back(&self) -> Result<(), ExperimentError> {
        Ok(())
    }

    /// Tears down and rebuilds the simulation.
    async fn reload(&self) -> Result<(), ExperimentError>;

    /// Whether the experiment starts running by itself once opened, and is not
    /// resumed by a reload.
    fn is_autorun(&self) -> bool {
        false
    }

    /// Observability hook called on every state transition.
    fn on_state_changed(&self, _state: ExperimentState) {}

    /// Failure hook: an error the controller could not recover from, or a step fault.
    fn report_fault(&self, _error: &ExperimentError) {}

    /// Asks the experiment to close itself. Called once, on the failure path or
    /// from [`close`](crate::ExperimentController::close).
    async fn close(&self) {}
}
