//! # Controller: interactive façade over the dispatcher and the stepper.
//!
//! ```text
//! ControllerBuilder::build()
//!   ├─► Bus + subscriber listener (if any subscribers)
//!   ├─► CommandChannel ──► CommandInbox ──► run_dispatcher   (task)
//!   └─► run_stepper                                          (task)
//!
//! process_*(and_wait)
//!   ├─ false ─► enqueue ─► CommandQueued | CommandRejected
//!   └─ true  ─► run_command in the caller's task (same interpret lock)
//! ```
//!
//! ## Teardown order
//! 1. `disposing = true`, `paused = true`, state NotReady, `ShutdownRequested`;
//! 2. context cleared, both loops told to stop;
//! 3. step gate released then closed, completion gate closed;
//! 4. dispatcher token cancelled, Close forced onto the queue;
//! 5. state None.
//!
//! ## Rules
//! - Teardown runs once; `close()` additionally closes the experiment once.
//! - The failure path runs inside `interpret` and never re-enters it.
//! - Nothing here joins the loops; [`Controller::join`] does, bounded by the grace period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{ControllerError, ExperimentError, SubmitError},
    events::{Bus, Event, EventKind},
    experiments::{ExperimentRef, ExperimentState},
    subscribers::{Subscribe, SubscriberSet},
};

use super::{
    api::ExperimentController,
    channel::CommandChannel,
    command::Command,
    config::ControllerConfig,
    flags::{ContextStatus, Flags},
    gate::Gate,
};

/// Interactive experiment controller.
///
/// Owns the flags, both gates, the command queue and the two loops
/// (dispatcher and stepper) spawned at construction. The loops hold a reference
/// to the controller until disposal; call [`close`](ExperimentController::close)
/// or [`dispose`](ExperimentController::dispose) when done.
pub struct Controller {
    pub(super) experiment: ExperimentRef,
    pub(super) name: Arc<str>,
    pub(super) config: ControllerConfig,
    pub(super) flags: Flags,

    /// Governs whether the stepper may advance. Starts empty.
    pub(super) step_gate: Gate,
    /// Serializes Step commands against step completion. Starts full.
    pub(super) completion_gate: Gate,

    pub(super) channel: CommandChannel,
    /// Single serialization point for `interpret`.
    pub(super) interpret_lock: AsyncMutex<()>,

    pub(super) bus: Bus,
    pub(super) token: CancellationToken,
    loops: Mutex<Vec<(&'static str, JoinHandle<()>)>>,

    closed: AtomicBool,
    disposed: AtomicBool,
}

/// Builder for constructing a [`Controller`].
pub struct ControllerBuilder {
    experiment: ExperimentRef,
    config: ControllerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ControllerBuilder {
    /// Creates a builder bound to `experiment`, with default configuration.
    pub fn new(experiment: ExperimentRef) -> Self {
        Self {
            experiment,
            config: ControllerConfig::default(),
            subscribers: Vec::new(),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive controller events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the controller and spawns the dispatcher and stepper loops.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Controller> {
        let bus = Bus::new(self.config.bus_capacity_clamped());
        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            spawn_subscriber_listener(bus.subscribe(), set);
        }

        let (channel, inbox) = CommandChannel::new(self.config.queue_capacity_clamped());
        let name: Arc<str> = Arc::from(self.experiment.name());

        let controller = Arc::new(Controller {
            experiment: self.experiment,
            name,
            config: self.config,
            flags: Flags::new(),
            step_gate: Gate::with_permits(1, 0),
            completion_gate: Gate::new(1),
            channel,
            interpret_lock: AsyncMutex::new(()),
            bus,
            token: CancellationToken::new(),
            loops: Mutex::new(Vec::with_capacity(2)),
            closed: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });

        let dispatcher = tokio::spawn(Arc::clone(&controller).run_dispatcher(inbox));
        let stepper = tokio::spawn(Arc::clone(&controller).run_stepper());
        controller
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([("dispatcher", dispatcher), ("stepper", stepper)]);

        debug!(experiment = %controller.name, "controller started");
        controller
    }
}

/// Forwards bus events to the subscriber set until the bus closes.
fn spawn_subscriber_listener(mut rx: broadcast::Receiver<Event>, set: SubscriberSet) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}

impl Controller {
    /// Creates a controller with the given configuration and no subscribers.
    pub fn new(experiment: ExperimentRef, config: ControllerConfig) -> Arc<Self> {
        ControllerBuilder::new(experiment).with_config(config).build()
    }

    /// Returns a builder bound to `experiment`.
    pub fn builder(experiment: ExperimentRef) -> ControllerBuilder {
        ControllerBuilder::new(experiment)
    }

    /// Name of the bound experiment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last reported experiment state.
    pub fn state(&self) -> ExperimentState {
        self.flags.state()
    }

    /// Number of steps the experiment completed under this controller.
    pub fn cycle(&self) -> u64 {
        self.flags.cycle()
    }

    /// Receiver for controller events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Waits for both loops to exit, up to [`ControllerConfig::grace`].
    ///
    /// Meant to be called after disposal. Loops still running when the grace
    /// period ends are aborted and reported in [`ControllerError::GraceExceeded`].
    pub async fn join(&self) -> Result<(), ControllerError> {
        let loops = std::mem::take(
            &mut *self.loops.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let grace = self.config.grace;
        let deadline = tokio::time::Instant::now() + grace;

        let mut stuck = Vec::new();
        for (name, mut handle) in loops {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                stuck.push(name);
            }
        }

        if stuck.is_empty() {
            self.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            warn!(experiment = %self.name, ?stuck, ?grace, "loops did not stop within grace");
            self.publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
            Err(ControllerError::GraceExceeded { grace, stuck })
        }
    }

    /// Routes `command` either through the queue or straight to `interpret`.
    async fn submit(&self, command: Command, and_wait: bool) -> bool {
        if !and_wait {
            return self.enqueue(command).is_ok();
        }
        if self.flags.is_disposing() {
            debug!(experiment = %self.name, %command, "synchronous command after disposal ignored");
            return false;
        }
        self.run_command(command).await
    }

    /// Non-blocking submission onto the command queue.
    pub(super) fn enqueue(&self, command: Command) -> Result<(), SubmitError> {
        let res = if self.flags.is_disposing() {
            Err(SubmitError::Disposing)
        } else {
            self.channel.offer(command)
        };
        match res {
            Ok(()) => self.publish(Event::new(EventKind::CommandQueued).with_command(command)),
            Err(e) => {
                debug!(experiment = %self.name, %command, reason = e.as_label(), "command rejected");
                self.publish(
                    Event::new(EventKind::CommandRejected)
                        .with_command(command)
                        .with_reason(e.as_label()),
                );
            }
        }
        res
    }

    /// Records a state transition and notifies the experiment and the bus.
    pub(super) fn update_state(&self, state: ExperimentState, command: Option<Command>) {
        self.flags.set_state(state);
        self.experiment.on_state_changed(state);

        let mut ev = Event::new(EventKind::StateChanged).with_state(state);
        if let Some(command) = command {
            ev = ev.with_command(command);
        }
        self.publish(ev);
    }

    /// Publishes an event tagged with the experiment name.
    pub(super) fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_experiment(Arc::clone(&self.name)));
    }

    /// Failure path: report the fault, close the experiment, tear down.
    ///
    /// Runs inside `interpret`; never re-enters it.
    pub(super) async fn fail(&self, command: Command, error: ExperimentError) {
        error!(experiment = %self.name, %command, error = %error, "closing experiment after fault");
        self.publish(
            Event::new(EventKind::FaultReported)
                .with_command(command)
                .with_reason(error.as_message()),
        );
        self.experiment.report_fault(&error);
        self.shutdown_experiment().await;
    }

    /// Closes the experiment once, then disposes the controller.
    async fn shutdown_experiment(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.flags.begin_disposing();
        self.experiment.close().await;
        self.teardown();
    }

    /// Cooperative teardown of both loops. Runs once.
    fn teardown(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(experiment = %self.name, cycle = self.flags.cycle(), "disposing controller");
        self.flags.begin_disposing();
        self.flags.set_paused(true);
        self.update_state(ExperimentState::NotReady, None);
        self.publish(Event::new(EventKind::ShutdownRequested));

        self.flags.set_context(ContextStatus::Absent);
        self.flags.stop_loops();

        // Unstick the stepper, then make every later acquire fail fast.
        self.step_gate.release();
        self.step_gate.close();
        self.completion_gate.close();

        self.token.cancel();
        // Wakes a dispatcher blocked in `receive`; a full queue is covered by the token.
        self.channel.force(Command::Close);

        self.update_state(ExperimentState::None, None);
    }
}

#[async_trait]
impl ExperimentController for Controller {
    async fn process_open(&self, and_wait: bool) -> bool {
        self.submit(Command::Open, and_wait).await
    }

    async fn process_start(&self, and_wait: bool) -> bool {
        self.submit(Command::Start, and_wait).await
    }

    async fn process_pause(&self, and_wait: bool) -> bool {
        self.submit(Command::Pause, and_wait).await
    }

    async fn process_step(&self, and_wait: bool) -> bool {
        self.submit(Command::Step, and_wait).await
    }

    async fn process_back(&self, and_wait: bool) -> bool {
        self.submit(Command::Back, and_wait).await
    }

    async fn process_reload(&self, and_wait: bool) -> bool {
        self.submit(Command::Reload, and_wait).await
    }

    async fn close(&self) {
        self.shutdown_experiment().await;
    }

    async fn dispose(&self) {
        self.teardown();
    }

    fn is_paused(&self) -> bool {
        self.flags.is_paused()
    }

    fn is_disposing(&self) -> bool {
        self.flags.is_disposing()
    }
}
