//! # Dispatcher: interprets commands one at a time.
//!
//! ```text
//! while accepting_commands {
//!   ├─► receive() ─── or token cancelled ─► exit
//!   └─► run_command(cmd)
//!         ├─► lock interpret_lock        (shared with synchronous callers)
//!         ├─► interpret(cmd)             (panics caught, loop keeps going)
//!         └─► unlock
//! }
//! ```
//!
//! ## Rules
//! - `interpret` never runs concurrently with itself.
//! - The dispatcher waits only in `receive()` and in Step's `completion_gate.acquire()`.
//! - Errors and panics raised by experiment code during Open/Start/Reload/Back go
//!   to the failure path.
//! - Any other panic is logged and published as `CommandFailed`; the dispatcher
//!   keeps running.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info};

use crate::{
    error::ExperimentError,
    events::{Event, EventKind},
    experiments::ExperimentState,
};

use super::{channel::CommandInbox, command::Command, flags::ContextStatus, interactive::Controller};

impl Controller {
    pub(super) async fn run_dispatcher(self: Arc<Self>, mut inbox: CommandInbox) {
        while self.flags.is_accepting_commands() {
            let command = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                received = inbox.receive() => match received {
                    Some(command) => command,
                    None => break,
                },
            };
            self.run_command(command).await;
        }
        debug!(experiment = %self.name, "dispatcher stopped");
    }

    /// Interprets `command` under the interpret lock, containing panics.
    pub(super) async fn run_command(&self, command: Command) -> bool {
        let _serial = self.interpret_lock.lock().await;
        match AssertUnwindSafe(self.interpret(command)).catch_unwind().await {
            Ok(accepted) => accepted,
            Err(payload) => {
                let err = ExperimentError::from_panic(payload);
                error!(experiment = %self.name, %command, error = %err, "command interpretation panicked");
                self.publish(
                    Event::new(EventKind::CommandFailed)
                        .with_command(command)
                        .with_reason(err.as_message()),
                );
                false
            }
        }
    }

    async fn interpret(&self, command: Command) -> bool {
        debug!(experiment = %self.name, %command, "interpreting command");
        match command {
            Command::Open => self.guarded(Command::Open, self.open_experiment()).await,
            Command::Start => {
                self.guarded(Command::Start, async {
                    self.start_running(Command::Start);
                    Ok(())
                })
                .await
            }
            Command::Pause => {
                self.flags.set_paused(true);
                if !self.flags.is_disposing() {
                    self.update_state(ExperimentState::Paused, Some(Command::Pause));
                }
                true
            }
            Command::Step => self.admit_one_step().await,
            Command::Back => self.guarded(Command::Back, self.step_back()).await,
            Command::Reload => self.guarded(Command::Reload, self.reload_experiment()).await,
            Command::Close => {
                self.update_state(ExperimentState::None, Some(Command::Close));
                true
            }
        }
    }

    /// Runs `body`, sending an error or a panic from experiment code to the failure path.
    async fn guarded<F>(&self, command: Command, body: F) -> bool
    where
        F: Future<Output = Result<(), ExperimentError>>,
    {
        let outcome = AssertUnwindSafe(body)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(ExperimentError::from_panic(payload)));
        match outcome {
            Ok(()) => true,
            Err(e) => {
                self.fail(command, e).await;
                false
            }
        }
    }

    async fn open_experiment(&self) -> Result<(), ExperimentError> {
        self.update_state(ExperimentState::NotReady, Some(Command::Open));
        self.experiment.open().await?;
        info!(experiment = %self.name, "experiment opened");
        self.flags.set_context(ContextStatus::Active);
        self.update_state(ExperimentState::Paused, Some(Command::Open));
        if self.experiment.is_autorun() {
            let _ = self.enqueue(Command::Start);
        }
        Ok(())
    }

    /// Resumes continuous stepping. Only a paused-to-running transition opens
    /// the step gate; the stepper never waits on it while running.
    fn start_running(&self, cause: Command) {
        if self.flags.swap_paused(false) {
            self.step_gate.release();
        }
        self.update_state(ExperimentState::Running, Some(cause));
    }

    async fn admit_one_step(&self) -> bool {
        // Waits until the previously admitted step has finished.
        if self.completion_gate.acquire().await.is_err() {
            return false;
        }
        self.update_state(ExperimentState::Paused, Some(Command::Step));
        self.flags.set_paused(true);
        self.step_gate.release();
        true
    }

    async fn step_back(&self) -> Result<(), ExperimentError> {
        self.flags.set_paused(true);
        self.update_state(ExperimentState::Paused, Some(Command::Back));
        self.experiment.step_back().await
    }

    async fn reload_experiment(&self) -> Result<(), ExperimentError> {
        let was_running = !self.flags.is_paused() && !self.experiment.is_autorun();
        self.flags.set_paused(true);
        self.update_state(ExperimentState::NotReady, Some(Command::Reload));

        self.experiment.reload().await?;
        info!(experiment = %self.name, was_running, "experiment reloaded");
        self.flags.set_context(ContextStatus::Active);
        if was_running {
            self.start_running(Command::Reload);
        } else {
            self.update_state(ExperimentState::Paused, Some(Command::Reload));
        }
        Ok(())
    }
}
