//! # Stepper: advances the simulation subject to pause/resume gating.
//!
//! ```text
//! while alive {
//!   ├─► if paused: step_gate.acquire()      (Start/Step release it)
//!   │   else:      step_gate.try_acquire()  (drops a permit nobody waits for)
//!   ├─► match context
//!   │     ├─ Absent   → paused = true
//!   │     ├─ Finished → paused = true
//!   │     └─ Active   → experiment.step()
//!   │                     ├─ Ok(Continue) → StepCompleted
//!   │                     ├─ Ok(Stop)     → context Finished, paused = true
//!   │                     └─ Err / panic  → StepFailed, paused = true
//!   └─► completion_gate.release()          (always)
//! }
//! ```
//!
//! ## Rules
//! - The stepper takes no lock; the gates are its only rendezvous.
//! - A fault never leaves the loop and never closes the experiment.
//! - One Step command admits exactly one pass: `paused` is already `true` when
//!   the gate opens, so the next pass blocks again.
//! - A running pass consumes any available permit, so the gate is empty whenever
//!   the stepper is not about to check `paused`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::{
    error::ExperimentError,
    events::{Event, EventKind},
    experiments::{ExperimentState, StepOutcome},
};

use super::{flags::ContextStatus, interactive::Controller};

impl Controller {
    pub(super) async fn run_stepper(self: Arc<Self>) {
        while self.flags.is_alive() {
            self.step_once().await;
            if !self.flags.is_paused() {
                tokio::task::yield_now().await;
            }
        }
        debug!(experiment = %self.name, "stepper stopped");
    }

    async fn step_once(&self) {
        if !self.flags.is_paused() {
            self.step_gate.try_acquire();
        } else if self.step_gate.acquire().await.is_err() {
            // Closed at teardown.
            self.completion_gate.release();
            return;
        }
        self.advance().await;
        self.completion_gate.release();
    }

    async fn advance(&self) {
        match self.flags.context() {
            ContextStatus::Absent => {
                // Nothing to run until Open binds a context.
                if !self.flags.swap_paused(true) {
                    self.settle_paused();
                }
                return;
            }
            ContextStatus::Finished => {
                self.flags.set_paused(true);
                self.settle_paused();
                return;
            }
            ContextStatus::Active => {}
        }

        let outcome = AssertUnwindSafe(self.experiment.step())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ExperimentError::from_panic(payload)));

        match outcome {
            Ok(StepOutcome::Continue) => {
                let cycle = self.flags.next_cycle();
                self.publish(Event::new(EventKind::StepCompleted).with_cycle(cycle));
            }
            Ok(StepOutcome::Stop) => {
                let cycle = self.flags.next_cycle();
                info!(experiment = %self.name, cycle, "experiment finished");
                self.flags.set_context(ContextStatus::Finished);
                self.flags.set_paused(true);
                self.publish(Event::new(EventKind::ExperimentFinished).with_cycle(cycle));
                self.settle_paused();
            }
            Err(e) => {
                let cycle = self.flags.cycle();
                warn!(experiment = %self.name, cycle, error = %e, "step failed");
                self.flags.set_paused(true);
                self.publish(
                    Event::new(EventKind::StepFailed)
                        .with_cycle(cycle)
                        .with_reason(e.as_message()),
                );
                self.experiment.report_fault(&e);
                self.settle_paused();
            }
        }
    }

    /// Reports `Paused` after the stepper paused itself, unless teardown began.
    fn settle_paused(&self) {
        if !self.flags.is_disposing() {
            self.update_state(ExperimentState::Paused, None);
        }
    }
}
