//! # Controller configuration.
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → clamped to 1
//! - `bus_capacity = 0` → clamped to 1
//! - `grace = 0s` → `join()` does not wait, it only reports loops still running

use std::time::Duration;

/// Configuration for an interactive [`Controller`](crate::Controller).
///
/// ## Field semantics
/// - `queue_capacity`: bounded command queue for asynchronous submissions; when
///   full, submissions are dropped (the call returns `false`).
/// - `grace`: how long [`Controller::join`](crate::Controller::join) waits for both
///   loops to exit after disposal.
/// - `bus_capacity`: event bus ring buffer size.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Capacity of the command queue.
    pub queue_capacity: usize,

    /// Maximum time `join()` waits for the dispatcher and the stepper to stop.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl ControllerConfig {
    /// Returns the command queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ControllerConfig {
    /// Default configuration:
    ///
    /// - `queue_capacity = 10`
    /// - `grace = 5s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacities_are_clamped() {
        let cfg = ControllerConfig {
            queue_capacity: 0,
            bus_capacity: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(cfg.queue_capacity_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(ControllerConfig::default().queue_capacity_clamped(), 10);
    }
}
