//! # Experiment abstractions.
//!
//! This module provides the types shared between the controller and the
//! simulation it drives:
//! - [`Experiment`] - trait implemented by the simulation/runtime layer
//! - [`ExperimentRef`] - shared reference to an experiment (`Arc<dyn Experiment>`)
//! - [`ExperimentState`] - observable lifecycle state
//! - [`StepOutcome`] - result of advancing the simulation by one step

mod experiment;
mod state;

pub use experiment::{Experiment, ExperimentRef};
pub use state::{ExperimentState, StepOutcome};
