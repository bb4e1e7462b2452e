//! # Bounded command queue between callers and the dispatcher.
//!
//! A thin pair over [`tokio::sync::mpsc`]:
//! - [`CommandChannel`] (sender side, owned by the controller): `offer` never
//!   blocks, it fails with [`SubmitError::Full`] or [`SubmitError::Closed`];
//! - [`CommandInbox`] (receiver side, owned by the dispatcher): `receive` waits
//!   for the next command in FIFO order.
//!
//! `force` is the teardown variant of `offer`: it never reports failure.

use tokio::sync::mpsc;

use crate::controller::Command;
use crate::error::SubmitError;

/// Sender side of the command queue.
#[derive(Debug)]
pub(crate) struct CommandChannel {
    tx: mpsc::Sender<Command>,
}

/// Receiver side of the command queue.
#[derive(Debug)]
pub(crate) struct CommandInbox {
    rx: mpsc::Receiver<Command>,
}

impl CommandChannel {
    /// Creates a bounded queue (capacity clamped to at least 1).
    pub(crate) fn new(capacity: usize) -> (Self, CommandInbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, CommandInbox { rx })
    }

    /// Appends `command` without blocking.
    pub(crate) fn offer(&self, command: Command) -> Result<(), SubmitError> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }
}

impl CommandChannel {
    /// Best-effort enqueue used at teardown; a full or closed queue is not an error.
    pub(crate) fn force(&self, command: Command) {
        if let Err(e) = self.offer(command) {
            tracing::debug!(%command, reason = e.as_label(), "forced command dropped");
        }
    }
}

impl CommandInbox {
    /// Waits for the next command; `None` once every sender is gone.
    pub(crate) async fn receive(&mut self) -> Option<Command> {
        self.rx.recv().await
    }
}
