//! # Public command surface shared by every controller variant.
//!
//! Two implementations exist:
//! - [`Controller`](crate::Controller): interactive pacing, two background loops;
//! - [`HeadlessController`](crate::HeadlessController): batch execution in the caller's task.
//!
//! ## `and_wait`
//! - `true`: the command is interpreted right away in the caller's task (serialized
//!   with the dispatcher); the result is the command's own outcome.
//! - `false`: the command is queued and the call returns immediately; `false` means
//!   the submission was rejected (queue full, controller disposing).

use async_trait::async_trait;

/// Command surface of an experiment controller.
#[async_trait]
pub trait ExperimentController: Send + Sync {
    /// Builds/loads the experiment.
    async fn process_open(&self, and_wait: bool) -> bool;

    /// Runs the experiment continuously.
    async fn process_start(&self, and_wait: bool) -> bool;

    /// Pauses before the next step.
    async fn process_pause(&self, and_wait: bool) -> bool;

    /// Lets exactly one step run, then stays paused.
    async fn process_step(&self, and_wait: bool) -> bool;

    /// Restores the previously recorded state.
    async fn process_back(&self, and_wait: bool) -> bool;

    /// Rebuilds the experiment; a running experiment resumes afterwards.
    async fn process_reload(&self, and_wait: bool) -> bool;

    /// Start if currently paused, pause otherwise.
    async fn process_start_pause(&self, and_wait: bool) -> bool {
        if self.is_paused() {
            self.process_start(and_wait).await
        } else {
            self.process_pause(and_wait).await
        }
    }

    /// Begins disposal: asks the experiment to close, then disposes. Idempotent.
    async fn close(&self);

    /// Completes teardown. Idempotent; later calls are no-ops.
    async fn dispose(&self);

    /// True while the experiment is not stepping continuously.
    fn is_paused(&self) -> bool;

    /// True once teardown has begun.
    fn is_disposing(&self) -> bool;
}
