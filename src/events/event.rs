//! # Runtime events emitted by the controller loops.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Command events**: submission and interpretation of [`Command`]s
//! - **Experiment events**: state transitions, steps, faults
//! - **Teardown events**: disposal and the grace-bounded join
//! - **Subscriber events**: overflow and panics inside subscribers
//!
//! The [`Event`] struct carries metadata such as timestamps, the experiment name,
//! the command, the new state and the cycle counter.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use simvisor::{Command, Event, EventKind, ExperimentState};
//!
//! let ev = Event::new(EventKind::StateChanged)
//!     .with_experiment("predator_prey")
//!     .with_command(Command::Start)
//!     .with_state(ExperimentState::Running);
//!
//! assert_eq!(ev.kind, EventKind::StateChanged);
//! assert_eq!(ev.experiment.as_deref(), Some("predator_prey"));
//! assert_eq!(ev.state, Some(ExperimentState::Running));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::controller::Command;
use crate::experiments::ExperimentState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `experiment`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `experiment`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Command events ===
    /// Command accepted onto the command queue.
    ///
    /// Sets:
    /// - `experiment`, `command`
    CommandQueued,

    /// Asynchronous submission rejected (queue full, closed or disposing).
    ///
    /// Sets:
    /// - `experiment`, `command`
    /// - `reason`: rejection label
    CommandRejected,

    /// Interpretation of a command panicked; the dispatcher kept running.
    ///
    /// Sets:
    /// - `experiment`, `command`
    /// - `reason`: panic info
    CommandFailed,

    // === Experiment events ===
    /// Experiment state changed.
    ///
    /// Sets:
    /// - `experiment`, `state`
    /// - `command`: command that caused the transition, if any
    StateChanged,

    /// One step completed and the simulation wants to continue.
    ///
    /// Sets:
    /// - `experiment`, `cycle`
    StepCompleted,

    /// A step raised a fault (error or panic); the controller paused.
    ///
    /// Sets:
    /// - `experiment`, `cycle`, `reason`
    StepFailed,

    /// The simulation reported that it will not continue (stop condition).
    ///
    /// Sets:
    /// - `experiment`, `cycle`
    ExperimentFinished,

    /// An unrecoverable fault closed the experiment (failure path).
    ///
    /// Sets:
    /// - `experiment`, `command`, `reason`
    FaultReported,

    // === Teardown events ===
    /// Disposal started.
    ShutdownRequested,

    /// Both loops stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some loop did not stop in time.
    ///
    /// Sets:
    /// - `reason`: names of the stuck loops
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the experiment (or subscriber for subscriber events).
    pub experiment: Option<Arc<str>>,
    /// Command the event relates to.
    pub command: Option<Command>,
    /// New experiment state (for `StateChanged`).
    pub state: Option<ExperimentState>,
    /// Completed-step counter at the time of the event.
    pub cycle: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            experiment: None,
            command: None,
            state: None,
            cycle: None,
            reason: None,
        }
    }

    /// Attaches the experiment name.
    #[inline]
    pub fn with_experiment(mut self, name: impl Into<Arc<str>>) -> Self {
        self.experiment = Some(name.into());
        self
    }

    /// Attaches a command.
    #[inline]
    pub fn with_command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    /// Attaches an experiment state.
    #[inline]
    pub fn with_state(mut self, state: ExperimentState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches the cycle counter.
    #[inline]
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_experiment(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_experiment(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::StepCompleted);
        let b = Event::new(EventKind::StepCompleted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn overflow_event_names_subscriber() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.experiment.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
