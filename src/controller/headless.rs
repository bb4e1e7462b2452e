//! # HeadlessController: batch execution without pacing.
//!
//! Same command surface as [`Controller`](crate::Controller), none of its
//! machinery: no loops, no gates, no queue. Every command runs in the caller's
//! task, whatever `and_wait` says.
//!
//! - Open, Pause, Step, Back, Reload: no-ops reporting success.
//! - Start: steps the experiment until it reports [`StepOutcome::Stop`] (`true`)
//!   or faults (`false`, after [`Experiment::report_fault`](crate::Experiment::report_fault)).
//! - Start/Pause toggling always starts ([`is_paused`](ExperimentController::is_paused) is `false`).
//! - After disposal every command reports `false`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::{
    error::ExperimentError,
    experiments::{ExperimentRef, ExperimentState, StepOutcome},
};

use super::api::ExperimentController;

/// Single-task controller for headless/batch runs.
pub struct HeadlessController {
    experiment: ExperimentRef,
    name: Arc<str>,
    disposing: AtomicBool,
    closed: AtomicBool,
    disposed: AtomicBool,
    cycle: AtomicU64,
}

impl HeadlessController {
    /// Creates a controller bound to `experiment`. Spawns nothing.
    pub fn new(experiment: ExperimentRef) -> Self {
        let name = Arc::from(experiment.name());
        Self {
            experiment,
            name,
            disposing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            cycle: AtomicU64::new(0),
        }
    }

    /// Number of steps completed by `process_start`.
    pub fn cycle(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }

    fn accepts(&self) -> bool {
        !self.disposing.load(Ordering::SeqCst)
    }

    async fn run_to_completion(&self) -> bool {
        self.experiment.on_state_changed(ExperimentState::Running);
        let finished = loop {
            let outcome = AssertUnwindSafe(self.experiment.step())
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(ExperimentError::from_panic(payload)));

            match outcome {
                Ok(StepOutcome::Continue) => {
                    self.cycle.fetch_add(1, Ordering::SeqCst);
                }
                Ok(StepOutcome::Stop) => {
                    let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(experiment = %self.name, cycle, "experiment finished");
                    break true;
                }
                Err(e) => {
                    warn!(experiment = %self.name, cycle = self.cycle(), error = %e, "step failed");
                    self.experiment.report_fault(&e);
                    break false;
                }
            }
        };
        self.experiment.on_state_changed(ExperimentState::Paused);
        finished
    }
}

#[async_trait]
impl ExperimentController for HeadlessController {
    async fn process_open(&self, _and_wait: bool) -> bool {
        self.accepts()
    }

    async fn process_start(&self, _and_wait: bool) -> bool {
        if !self.accepts() {
            debug!(experiment = %self.name, "start after disposal ignored");
            return false;
        }
        self.run_to_completion().await
    }

    /// Never paused, so toggling always starts a run.
    async fn process_start_pause(&self, and_wait: bool) -> bool {
        self.process_start(and_wait).await
    }

    async fn process_pause(&self, _and_wait: bool) -> bool {
        self.accepts()
    }

    async fn process_step(&self, _and_wait: bool) -> bool {
        self.accepts()
    }

    async fn process_back(&self, _and_wait: bool) -> bool {
        self.accepts()
    }

    async fn process_reload(&self, _and_wait: bool) -> bool {
        self.accepts()
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disposing.store(true, Ordering::SeqCst);
        self.experiment.close().await;
        self.dispose().await;
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disposing.store(true, Ordering::SeqCst);
        debug!(experiment = %self.name, "headless controller disposed");
        self.experiment.on_state_changed(ExperimentState::None);
    }

    fn is_paused(&self) -> bool {
        false
    }

    fn is_disposing(&self) -> bool {
        !self.accepts()
    }
}
