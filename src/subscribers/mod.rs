//! # Event subscribers for the controller runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the optional built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Dispatcher/Stepper ── publish(Event) ──► Bus ──► subscriber listener
//!                                                         │
//!                                                  SubscriberSet::emit
//!                                              ┌──────────┼──────────┐
//!                                              ▼          ▼          ▼
//!                                          LogWriter   Metrics    Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use simvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct CycleCounter;
//!
//! #[async_trait]
//! impl Subscribe for CycleCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::StepCompleted {
//!             // record event.cycle
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "cycle-counter"
//!     }
//! }
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod embedded;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
