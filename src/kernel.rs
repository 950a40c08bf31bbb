//! Cooperative Task Kernel
//!
//! A fixed-capacity round-robin kernel. Each task is a future placed in
//! caller-owned memory; the kernel keeps a task control block per slot and a
//! monotonic tick counter advanced by the periodic timer interrupt.
//!
//! # Contracts
//!
//! - [`Kernel::sleep`] is the only suspension point. `sleep(0)` yields and
//!   leaves the task Runnable; `sleep(n)` parks it until `now + n`.
//! - [`Kernel::start`] and [`Kernel::stop`] force a state atomically and
//!   override any pending wake tick. Stopping the running task takes effect
//!   at its next suspension point.
//! - [`Kernel::on_tick`] only touches bookkeeping; the switch to a woken
//!   task happens at the running task's next suspension point.
//! - Selection scans the non-idle slots circularly, starting after the
//!   current task, and falls back to the idle slot.
//!
//! All bookkeeping lives behind a `critical_section::Mutex`, so the tick
//! interrupt can never observe a half-updated control block.

pub mod mailbox;
pub mod scheduler;
pub mod task;

use core::cell::RefCell;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use critical_section::Mutex;

use crate::config::MAX_TASKS;

pub use mailbox::{Mailbox, MailboxError};
pub use scheduler::{Scheduler, TaskFuture};
pub use task::{TaskControlBlock, TaskHandle, TaskState};

/// Kernel clock value (wraps after 2^32 ticks)
pub type Tick = u32;

/// Kernel operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// All task slots are in use
    CapacityExceeded,
    /// Handle does not name a registered task
    InvalidHandle,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => f.write_str("task capacity exceeded"),
            Self::InvalidHandle => f.write_str("invalid task handle"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for KernelError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::CapacityExceeded => defmt::write!(f, "CapacityExceeded"),
            Self::InvalidHandle => defmt::write!(f, "InvalidHandle"),
        }
    }
}

struct KernelState<const N: usize> {
    tasks: [TaskControlBlock; N],
    count: usize,
    current: usize,
    now: Tick,
}

/// Task registry and clock
///
/// Intended to live in a `static` so that the tick interrupt and every task
/// can reach it.
pub struct Kernel<const N: usize = MAX_TASKS> {
    state: Mutex<RefCell<KernelState<N>>>,
}

impl<const N: usize> Kernel<N> {
    /// Create a kernel with only the idle slot registered
    #[must_use]
    pub const fn new() -> Self {
        let mut tasks = [TaskControlBlock::EMPTY; N];
        tasks[0] = TaskControlBlock::READY;
        Self {
            state: Mutex::new(RefCell::new(KernelState {
                tasks,
                count: 1,
                current: 0,
                now: 0,
            })),
        }
    }

    /// Task capacity, including the idle slot
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Current tick
    #[must_use]
    pub fn now(&self) -> Tick {
        critical_section::with(|cs| self.state.borrow_ref(cs).now)
    }

    /// Task currently executing (or last selected)
    #[must_use]
    pub fn current(&self) -> TaskHandle {
        critical_section::with(|cs| handle(self.state.borrow_ref(cs).current))
    }

    /// Number of registered tasks, including idle
    #[must_use]
    pub fn task_count(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).count)
    }

    /// State of a registered task
    #[must_use]
    pub fn task_state(&self, task: TaskHandle) -> Option<TaskState> {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            state
                .tasks
                .get(task.index())
                .filter(|tcb| tcb.registered)
                .map(|tcb| tcb.state)
        })
    }

    /// Suspend the calling task for `ticks` ticks
    ///
    /// Must be awaited from inside a task polled by the [`Scheduler`].
    pub fn sleep(&self, ticks: Tick) -> Sleep<'_, N> {
        Sleep {
            kernel: self,
            ticks,
            suspended: false,
        }
    }

    /// Force a task Runnable, discarding any pending wake tick
    ///
    /// A task whose future has completed cannot be restarted.
    pub fn start(&self, task: TaskHandle) -> Result<(), KernelError> {
        self.force(task, TaskState::Runnable)
    }

    /// Force a task Stopped, discarding any pending wake tick
    pub fn stop(&self, task: TaskHandle) -> Result<(), KernelError> {
        self.force(task, TaskState::Stopped)
    }

    /// Advance the clock by one tick and wake expired sleepers
    ///
    /// Call from the periodic timer interrupt.
    pub fn on_tick(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.now = state.now.wrapping_add(1);
            let now = state.now;
            for tcb in state.tasks.iter_mut().filter(|tcb| tcb.registered) {
                if tcb.wake_tick == now && tcb.state != TaskState::Stopped {
                    tcb.state = TaskState::Runnable;
                }
            }
        });
    }

    fn force(&self, task: TaskHandle, target: TaskState) -> Result<(), KernelError> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            match state.tasks.get_mut(task.index()) {
                Some(tcb) if tcb.registered && !tcb.retired => {
                    tcb.state = target;
                    Ok(())
                }
                _ => Err(KernelError::InvalidHandle),
            }
        })
    }

    /// Claim the next free slot
    pub(crate) fn admit(&self) -> Result<TaskHandle, KernelError> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.count >= N || state.count > usize::from(u8::MAX) {
                return Err(KernelError::CapacityExceeded);
            }
            let index = state.count;
            state.tasks[index] = TaskControlBlock::READY;
            state.count += 1;
            Ok(handle(index))
        })
    }

    /// Record the suspension of the running task
    pub(crate) fn suspend_current(&self, ticks: Tick) {
        if ticks == 0 {
            return;
        }
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let wake = state.now.wrapping_add(ticks);
            let current = state.current;
            let tcb = &mut state.tasks[current];
            if tcb.state != TaskState::Stopped {
                tcb.state = TaskState::Waiting;
                tcb.wake_tick = wake;
            }
        });
    }

    /// Select the next task to resume and make it current
    pub(crate) fn select_next(&self) -> TaskHandle {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let next = next_runnable(&state.tasks[..state.count], state.current);
            state.current = next;
            handle(next)
        })
    }

    /// Permanently stop a task whose future has completed
    pub(crate) fn retire(&self, task: TaskHandle) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if let Some(tcb) = state.tasks.get_mut(task.index()) {
                tcb.state = TaskState::Stopped;
                tcb.retired = true;
            }
        });
    }
}

impl<const N: usize> Default for Kernel<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Circular scan over the non-idle slots, starting after `current`
///
/// The current task is examined last; slot 0 is the fallback.
fn next_runnable(tasks: &[TaskControlBlock], current: usize) -> usize {
    let slots = tasks.len().saturating_sub(1);
    if slots == 0 {
        return 0;
    }
    let start = if current == 0 { 0 } else { current % slots };
    (0..slots)
        .map(|offset| 1 + (start + offset) % slots)
        .find(|&index| tasks[index].is_runnable())
        .unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation)]
const fn handle(index: usize) -> TaskHandle {
    TaskHandle::new(index as u8)
}

/// Future returned by [`Kernel::sleep`]
///
/// The first poll records the suspension and yields; the next poll (after
/// the scheduler has selected the task again) completes.
#[must_use = "sleep does nothing unless awaited"]
pub struct Sleep<'k, const N: usize = MAX_TASKS> {
    kernel: &'k Kernel<N>,
    ticks: Tick,
    suspended: bool,
}

impl<const N: usize> Future for Sleep<'_, N> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.suspended {
            Poll::Ready(())
        } else {
            self.suspended = true;
            self.kernel.suspend_current(self.ticks);
            Poll::Pending
        }
    }
}
