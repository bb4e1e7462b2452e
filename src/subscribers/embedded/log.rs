//! # LogWriter: tracing-backed event printer
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO  state changed experiment="prey" command=Some(Start) state=Some(Running)
//! WARN  step failed experiment="prey" cycle=Some(41) reason="division by zero"
//! INFO  experiment finished experiment="prey" cycle=Some(120)
//! ERROR fault reported experiment="prey" command=Some(Open) reason="build: missing species"
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let experiment = e.experiment.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::CommandQueued => {
                tracing::debug!(experiment, command = ?e.command, "command queued");
            }
            EventKind::CommandRejected => {
                tracing::debug!(experiment, command = ?e.command, reason, "command rejected");
            }
            EventKind::CommandFailed => {
                tracing::error!(experiment, command = ?e.command, reason, "command failed");
            }
            EventKind::StateChanged => {
                tracing::info!(experiment, command = ?e.command, state = ?e.state, "state changed");
            }
            EventKind::StepCompleted => {
                tracing::trace!(experiment, cycle = ?e.cycle, "step completed");
            }
            EventKind::StepFailed => {
                tracing::warn!(experiment, cycle = ?e.cycle, reason, "step failed");
            }
            EventKind::ExperimentFinished => {
                tracing::info!(experiment, cycle = ?e.cycle, "experiment finished");
            }
            EventKind::FaultReported => {
                tracing::error!(experiment, command = ?e.command, reason, "fault reported");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(experiment, "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(experiment, "all loops stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(experiment, stuck = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = experiment, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = experiment, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Command;
    use crate::experiments::ExperimentState;

    #[tokio::test]
    async fn renders_every_kind_without_panicking() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let writer = LogWriter::new();
        for kind in [
            EventKind::CommandQueued,
            EventKind::StateChanged,
            EventKind::StepFailed,
            EventKind::FaultReported,
            EventKind::GraceExceeded,
            EventKind::SubscriberOverflow,
        ] {
            let ev = Event::new(kind)
                .with_experiment("prey")
                .with_command(Command::Start)
                .with_state(ExperimentState::Running)
                .with_cycle(3)
                .with_reason("runtime: boom");
            writer.on_event(&ev).await;
        }
        assert_eq!(writer.name(), "LogWriter");
    }
}
