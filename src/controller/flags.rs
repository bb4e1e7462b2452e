//! # Shared controller flags.
//!
//! The only state shared between the dispatcher, the stepper and callers. Every
//! field is an atomic; nothing here is ever locked.
//!
//! ## Rules
//! - `alive` and `accepting_commands` only go `true → false` (teardown).
//! - `disposing` only goes `false → true`.
//! - The stepper reads `alive`, `paused` and `context`; it writes `paused`,
//!   `context` (finished) and `cycle`.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use crate::experiments::ExperimentState;

/// Whether a runnable simulation is bound to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum ContextStatus {
    /// Not opened yet, or unbound at teardown.
    Absent = 0,
    /// Opened or reloaded; steps run.
    Active = 1,
    /// A step reported the stop condition; steps are refused until reload.
    Finished = 2,
}

impl ContextStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ContextStatus::Active,
            2 => ContextStatus::Finished,
            _ => ContextStatus::Absent,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Flags {
    paused: AtomicBool,
    alive: AtomicBool,
    accepting_commands: AtomicBool,
    disposing: AtomicBool,
    context: AtomicU8,
    state: AtomicU8,
    cycle: AtomicU64,
}

impl Flags {
    pub(crate) fn new() -> Self {
        Self {
            paused: AtomicBool::new(true),
            alive: AtomicBool::new(true),
            accepting_commands: AtomicBool::new(true),
            disposing: AtomicBool::new(false),
            context: AtomicU8::new(ContextStatus::Absent as u8),
            state: AtomicU8::new(ExperimentState::None as u8),
            cycle: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Stores `paused`, returning the previous value.
    #[inline]
    pub(crate) fn swap_paused(&self, paused: bool) -> bool {
        self.paused.swap(paused, Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn is_accepting_commands(&self) -> bool {
        self.accepting_commands.load(Ordering::SeqCst)
    }

    #[inline]
    pub(crate) fn is_disposing(&self) -> bool {
        self.disposing.load(Ordering::SeqCst)
    }

    /// Marks teardown as started. Returns the previous value.
    #[inline]
    pub(crate) fn begin_disposing(&self) -> bool {
        self.disposing.swap(true, Ordering::SeqCst)
    }

    /// Stops both loops. Irreversible.
    pub(crate) fn stop_loops(&self) {
        self.accepting_commands.store(false, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn context(&self) -> ContextStatus {
        ContextStatus::from_u8(self.context.load(Ordering::SeqCst))
    }

    #[inline]
    pub(crate) fn set_context(&self, status: ContextStatus) {
        self.context.store(status as u8, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn state(&self) -> ExperimentState {
        ExperimentState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[inline]
    pub(crate) fn set_state(&self, state: ExperimentState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn cycle(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }

    /// Increments the cycle counter and returns the new value.
    #[inline]
    pub(crate) fn next_cycle(&self) -> u64 {
        self.cycle.fetch_add(1, Ordering::SeqCst) + 1
    }
}
