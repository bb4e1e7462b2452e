//! Experiment execution controllers.
//!
//! Internal modules:
//! - [`command`]: the closed set of controller verbs;
//! - [`gate`]: capacity-capped semaphore used as a rendezvous signal;
//! - `channel`: bounded command queue (non-blocking offer, FIFO receive);
//! - `flags`: atomics shared between the loops;
//! - `dispatcher`: interprets commands one at a time;
//! - `stepper`: advances the simulation under pause/step gating;
//! - `interactive`: the [`Controller`] façade and its builder;
//! - `headless`: the [`HeadlessController`] batch variant;
//! - `api`: the [`ExperimentController`] trait both variants implement.

pub mod command;
pub mod config;
pub mod gate;

mod api;
mod channel;
mod dispatcher;
mod flags;
mod headless;
mod interactive;
mod stepper;

#[cfg(test)]
mod tests;

pub use api::ExperimentController;
pub use command::Command;
pub use config::ControllerConfig;
pub use gate::{Gate, GateClosed};
pub use headless::HeadlessController;
pub use interactive::{Controller, ControllerBuilder};
