//! Task control blocks
//!
//! Static, no-alloc bookkeeping for each task slot. The task's resumable
//! state (its future) lives in caller-owned memory and is held by the
//! [`Scheduler`](super::Scheduler); the control block only records when
//! the task may run.

use super::Tick;

/// Task scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Never scheduled until explicitly started
    Stopped,
    /// Sleeping until the clock reaches the wake tick
    Waiting,
    /// Eligible for selection
    Runnable,
}

#[cfg(feature = "embedded")]
impl defmt::Format for TaskState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Stopped => defmt::write!(f, "Stopped"),
            Self::Waiting => defmt::write!(f, "Waiting"),
            Self::Runnable => defmt::write!(f, "Runnable"),
        }
    }
}

/// Dense task index returned by registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(u8);

impl TaskHandle {
    /// The idle task, always slot 0
    pub const IDLE: Self = Self(0);

    /// Create a handle from a slot index
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Slot index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check whether this is the idle slot
    #[must_use]
    pub const fn is_idle(self) -> bool {
        self.0 == 0
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TaskHandle {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Task#{}", self.0);
    }
}

/// Per-slot bookkeeping
#[derive(Debug, Clone, Copy)]
pub struct TaskControlBlock {
    /// Current state
    pub state: TaskState,
    /// Tick at which a Waiting task becomes Runnable
    pub wake_tick: Tick,
    /// Slot has been handed out by registration
    pub registered: bool,
    /// Task future has completed; the slot never runs again
    pub retired: bool,
}

impl TaskControlBlock {
    /// Unused slot
    pub const EMPTY: Self = Self {
        state: TaskState::Stopped,
        wake_tick: 0,
        registered: false,
        retired: false,
    };

    /// Freshly registered slot, immediately eligible to run
    pub const READY: Self = Self {
        state: TaskState::Runnable,
        wake_tick: 0,
        registered: true,
        retired: false,
    };

    /// Check whether the slot may be selected
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.registered && !self.retired && self.state == TaskState::Runnable
    }
}
