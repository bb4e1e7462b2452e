//! # simvisor
//!
//! **Simvisor** drives step-based simulations (experiments) on behalf of a
//! user interface or a batch job.
//!
//! A controller accepts commands (open, start, pause, step, back, reload, close),
//! interprets them one at a time, and runs the simulation on a background loop
//! that can be paused, resumed, advanced by exactly one step, reloaded or torn
//! down. The simulation itself is opaque: everything goes through [`Experiment`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!        UI / caller
//!   process_*(and_wait)
//!            │
//!            ├── and_wait = false ──► CommandChannel (bounded, try_send)
//!            │                               │
//!            │                               ▼
//!            │                        ┌──────────────┐
//!            └── and_wait = true ───► │  interpret   │◄── interpret_lock
//!                                     │ (Dispatcher) │
//!                                     └──────┬───────┘
//!                   Start/Step release       │  Step waits on
//!                   step_gate                │  completion_gate
//!                                            ▼
//!                                     ┌──────────────┐
//!                                     │   Stepper    │──► Experiment::step()
//!                                     └──────┬───────┘
//!                                            │ releases completion_gate
//!                                            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                   Bus (broadcast channel)                         │
//! │              (capacity: ControllerConfig::bus_capacity)           │
//! └───────────────────┬───────────────────────────────┬───────────────┘
//!                     ▼                               ▼
//!          subscriber_listener               Controller::subscribe()
//!                     ▼
//!               SubscriberSet
//!           ┌─────────┼─────────┐
//!           ▼         ▼         ▼
//!        worker1   worker2   workerN
//! ```
//!
//! ### Lifecycle
//! ```text
//! Controller::new ──► spawn dispatcher + stepper (paused, no context)
//!
//! Open   ──► NotReady ──► experiment.open() ─┬─ Ok  ──► Paused (autorun: queue Start)
//!                                            └─ Err ──► failure path
//! Start  ──► Running, stepper loops until paused
//! Step   ──► wait for the previous step, admit exactly one more
//! Pause  ──► Paused before the next step
//! Back   ──► Paused, experiment.step_back()
//! Reload ──► NotReady, experiment.reload(), resume if it was running
//!
//! failure path: FaultReported ──► report_fault ──► experiment.close() ──► dispose
//! dispose:      NotReady ──► stop loops, close gates, cancel token ──► None
//! ```
//!
//! ## Features
//! | Area              | Description                                                        | Key types / traits                               |
//! |-------------------|--------------------------------------------------------------------|--------------------------------------------------|
//! | **Controllers**   | Interactive pacing and headless batch execution.                   | [`Controller`], [`HeadlessController`]           |
//! | **Commands**      | One command surface for both variants.                             | [`ExperimentController`], [`Command`]            |
//! | **Experiments**   | The simulation seen from the controller.                           | [`Experiment`], [`ExperimentState`]              |
//! | **Subscriber API**| Hook into controller events (logging, metrics, custom subscribers).| [`Subscribe`], [`Event`]                         |
//! | **Errors**        | Typed errors for experiments, submissions and teardown.            | [`ExperimentError`], [`ControllerError`]         |
//! | **Configuration** | Queue size, teardown grace period, bus capacity.                   | [`ControllerConfig`]                             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use async_trait::async_trait;
//! use simvisor::{
//!     Controller, ControllerConfig, Experiment, ExperimentController, ExperimentError,
//!     StepOutcome,
//! };
//!
//! struct Ticks(AtomicU64);
//!
//! #[async_trait]
//! impl Experiment for Ticks {
//!     fn name(&self) -> &str { "ticks" }
//!     async fn open(&self) -> Result<(), ExperimentError> { Ok(()) }
//!     async fn step(&self) -> Result<StepOutcome, ExperimentError> {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         Ok(StepOutcome::Continue)
//!     }
//!     async fn reload(&self) -> Result<(), ExperimentError> { Ok(()) }
//! }
//!
//! #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ticks = Arc::new(Ticks(AtomicU64::new(0)));
//!     let ctl = Controller::new(ticks.clone(), ControllerConfig::default());
//!
//!     assert!(ctl.process_open(true).await);
//!     assert!(ctl.process_step(true).await);
//!     assert!(ctl.is_paused());
//!
//!     ctl.dispose().await;
//!     ctl.join().await?;
//!     Ok(())
//! }
//! ```
mod controller;
mod error;
mod events;
mod experiments;
mod subscribers;

// ---- Public re-exports ----

pub use controller::{
    Command, Controller, ControllerBuilder, ControllerConfig, ExperimentController, Gate,
    GateClosed, HeadlessController,
};
pub use error::{ControllerError, ExperimentError, SubmitError};
pub use events::{Bus, Event, EventKind};
pub use experiments::{Experiment, ExperimentRef, ExperimentState, StepOutcome};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
