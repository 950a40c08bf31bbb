//! Round-robin scheduler
//!
//! Owns the task futures and resumes one task per [`Scheduler::step`].
//! Registration is only possible while the scheduler value exists;
//! [`Scheduler::start_scheduling`] consumes it and never returns.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Waker};

use super::{Kernel, KernelError, TaskHandle};
use crate::config::MAX_TASKS;
use crate::{log_error, log_info};

/// A task body pinned in caller-owned memory
pub type TaskFuture<'t> = Pin<&'t mut dyn Future<Output = ()>>;

/// Task registry front-end and executor loop
pub struct Scheduler<'k, 't, const N: usize = MAX_TASKS> {
    kernel: &'k Kernel<N>,
    tasks: [Option<TaskFuture<'t>>; N],
}

impl<'k, 't, const N: usize> Scheduler<'k, 't, N> {
    /// Create a scheduler for a kernel
    #[must_use]
    pub fn new(kernel: &'k Kernel<N>) -> Self {
        Self {
            kernel,
            tasks: core::array::from_fn(|_| None),
        }
    }

    /// Register a task; it becomes Runnable immediately
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CapacityExceeded`] when every slot is taken.
    pub fn register(&mut self, task: TaskFuture<'t>) -> Result<TaskHandle, KernelError> {
        let handle = self
            .kernel
            .admit()
            .inspect_err(|_| log_error!("task registry full ({} slots)", N))?;
        self.tasks[handle.index()] = Some(task);
        Ok(handle)
    }

    /// Select the next task and resume it once
    ///
    /// Returns the selected task. When the idle slot is selected nothing is
    /// polled; the caller runs its idle work instead.
    pub fn step(&mut self) -> TaskHandle {
        let next = self.kernel.select_next();
        if next.is_idle() {
            return next;
        }

        let mut cx = Context::from_waker(Waker::noop());
        let finished = self.tasks[next.index()]
            .as_mut()
            .is_none_or(|task| task.as_mut().poll(&mut cx).is_ready());

        // a slot without a future is retired as well, so it cannot spin
        if finished {
            self.tasks[next.index()] = None;
            self.kernel.retire(next);
        }
        next
    }

    /// Run the idle task forever
    ///
    /// `initial_hook` runs once in idle context before the first task is
    /// resumed; `idle` runs whenever no other task is Runnable.
    pub fn start_scheduling<H, I>(mut self, initial_hook: H, mut idle: I) -> !
    where
        H: FnOnce(),
        I: FnMut(),
    {
        log_info!("scheduler starting with {} tasks", self.kernel.task_count());
        initial_hook();
        loop {
            if self.step().is_idle() {
                idle();
            }
        }
    }
}
