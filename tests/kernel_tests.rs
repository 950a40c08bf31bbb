//! Kernel Tests
//!
//! Scheduling, sleeping, forced start/stop and the single-slot mailbox,
//! driven tick by tick on the host.
//! Run with: cargo test --no-default-features --features std --test kernel_tests

mod common;

use core::cell::{Cell, RefCell};
use core::pin::pin;

use common::{block_on, run_ticks, run_until_stopped};
use lcr_meter::config::{MAILBOX_POST_LIMIT, MAX_TASKS};
use lcr_meter::kernel::{Kernel, KernelError, Mailbox, MailboxError, Scheduler, TaskHandle, TaskState};

async fn counter(kernel: &Kernel, count: &Cell<u32>, period: u32) {
    loop {
        count.set(count.get() + 1);
        kernel.sleep(period).await;
    }
}

async fn yielder(kernel: &Kernel, log: &RefCell<Vec<char>>, name: char, rounds: usize) {
    for _ in 0..rounds {
        log.borrow_mut().push(name);
        kernel.sleep(0).await;
    }
}

async fn spinner(kernel: &Kernel, count: &Cell<u32>) {
    loop {
        count.set(count.get() + 1);
        kernel.sleep(0).await;
    }
}

async fn stops_itself(kernel: &Kernel, count: &Cell<u32>) {
    kernel.stop(kernel.current()).unwrap();
    count.set(count.get() + 1);
    kernel.sleep(1).await;
    count.set(count.get() + 1);
}

async fn receive(kernel: &Kernel, mailbox: &Mailbox<u8>, received: &RefCell<Vec<u8>>) {
    loop {
        if let Some(n) = mailbox.peek() {
            received.borrow_mut().push(n);
            mailbox.clear();
        }
        kernel.sleep(3).await;
    }
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn test_new_kernel_has_only_idle() {
    let kernel: Kernel = Kernel::new();
    assert_eq!(kernel.task_count(), 1);
    assert_eq!(kernel.capacity(), MAX_TASKS);
    assert_eq!(kernel.current(), TaskHandle::IDLE);
    assert_eq!(kernel.now(), 0);
}

#[test]
fn test_registration_hands_out_dense_handles() {
    let kernel: Kernel = Kernel::new();
    let count = Cell::new(0);
    let mut a = pin!(counter(&kernel, &count, 1));
    let mut b = pin!(counter(&kernel, &count, 1));

    let mut scheduler = Scheduler::new(&kernel);
    let first = scheduler.register(a.as_mut()).unwrap();
    let second = scheduler.register(b.as_mut()).unwrap();

    assert_eq!(first.index(), 1);
    assert_eq!(second.index(), 2);
    assert_eq!(kernel.task_state(first), Some(TaskState::Runnable));
    assert_eq!(kernel.task_count(), 3);
}

#[test]
fn test_capacity_exceeded() {
    let kernel: Kernel<3> = Kernel::new();
    let mut a = pin!(async {});
    let mut b = pin!(async {});
    let mut c = pin!(async {});

    let mut scheduler = Scheduler::new(&kernel);
    assert!(scheduler.register(a.as_mut()).is_ok());
    assert!(scheduler.register(b.as_mut()).is_ok());
    assert_eq!(
        scheduler.register(c.as_mut()),
        Err(KernelError::CapacityExceeded)
    );
}

#[test]
fn test_unknown_handle_rejected() {
    let kernel: Kernel = Kernel::new();
    assert_eq!(kernel.stop(TaskHandle::new(4)), Err(KernelError::InvalidHandle));
    assert_eq!(kernel.start(TaskHandle::new(200)), Err(KernelError::InvalidHandle));
    assert_eq!(kernel.task_state(TaskHandle::new(4)), None);
}

// =============================================================================
// Scheduling
// =============================================================================

#[test]
fn test_round_robin_runs_every_task() {
    let kernel: Kernel = Kernel::new();
    let a = Cell::new(0);
    let b = Cell::new(0);
    let mut task_a = pin!(counter(&kernel, &a, 1));
    let mut task_b = pin!(counter(&kernel, &b, 1));

    let mut scheduler = Scheduler::new(&kernel);
    scheduler.register(task_a.as_mut()).unwrap();
    scheduler.register(task_b.as_mut()).unwrap();

    run_ticks(&kernel, &mut scheduler, 10);

    assert_eq!(a.get(), 10);
    assert_eq!(b.get(), 10);
    assert_eq!(kernel.now(), 10);
}

#[test]
fn test_zero_sleep_yields_in_turn() {
    let kernel: Kernel = Kernel::new();
    let log = RefCell::new(Vec::new());
    let mut a = pin!(yielder(&kernel, &log, 'a', 3));
    let mut b = pin!(yielder(&kernel, &log, 'b', 3));

    let mut scheduler = Scheduler::new(&kernel);
    scheduler.register(a.as_mut()).unwrap();
    let last = scheduler.register(b.as_mut()).unwrap();

    let ticks = run_until_stopped(&kernel, &mut scheduler, last, 5);

    assert_eq!(ticks, 0, "zero sleeps never wait for the clock");
    assert_eq!(log.borrow().iter().collect::<String>(), "ababab");
}

#[test]
fn test_sleep_wakes_after_requested_ticks() {
    let kernel: Kernel = Kernel::new();

    let (before, after) = block_on(
        &kernel,
        async {
            let before = kernel.now();
            kernel.sleep(5).await;
            (before, kernel.now())
        },
        100,
    );

    assert_eq!(after - before, 5);
}

#[test]
fn test_slow_task_runs_at_its_own_period() {
    let kernel: Kernel = Kernel::new();
    let fast = Cell::new(0);
    let slow = Cell::new(0);
    let mut task_fast = pin!(counter(&kernel, &fast, 1));
    let mut task_slow = pin!(counter(&kernel, &slow, 4));

    let mut scheduler = Scheduler::new(&kernel);
    scheduler.register(task_fast.as_mut()).unwrap();
    scheduler.register(task_slow.as_mut()).unwrap();

    run_ticks(&kernel, &mut scheduler, 12);

    assert_eq!(fast.get(), 12);
    assert_eq!(slow.get(), 3);
}

#[test]
fn test_completed_task_is_stopped() {
    let kernel: Kernel = Kernel::new();
    let mut task = pin!(async {});

    let mut scheduler = Scheduler::new(&kernel);
    let handle = scheduler.register(task.as_mut()).unwrap();

    assert_eq!(scheduler.step(), handle);
    assert_eq!(kernel.task_state(handle), Some(TaskState::Stopped));
    assert!(scheduler.step().is_idle());
}

#[test]
fn test_single_runnable_task_is_always_selected() {
    let kernel: Kernel = Kernel::new();
    let counts: Vec<Cell<u32>> = (1..MAX_TASKS).map(|_| Cell::new(0)).collect();
    let mut tasks: Vec<_> = counts.iter().map(|count| Box::pin(spinner(&kernel, count))).collect();

    let mut scheduler = Scheduler::new(&kernel);
    let handles: Vec<TaskHandle> = tasks
        .iter_mut()
        .map(|task| scheduler.register(task.as_mut()).unwrap())
        .collect();

    let live = handles[2];
    for &handle in handles.iter().filter(|&&handle| handle != live) {
        kernel.stop(handle).unwrap();
    }

    for _ in 0..20 {
        assert_eq!(scheduler.step(), live);
    }
    assert_eq!(counts[2].get(), 20);
    assert!(counts.iter().enumerate().all(|(i, count)| i == 2 || count.get() == 0));
}

#[test]
fn test_completed_task_cannot_be_restarted() {
    let kernel: Kernel = Kernel::new();
    let mut task = pin!(async {});

    let mut scheduler = Scheduler::new(&kernel);
    let handle = scheduler.register(task.as_mut()).unwrap();
    assert_eq!(scheduler.step(), handle);

    assert_eq!(kernel.start(handle), Err(KernelError::InvalidHandle));
    assert_eq!(kernel.stop(handle), Err(KernelError::InvalidHandle));
    assert_eq!(kernel.task_state(handle), Some(TaskState::Stopped));
    assert!(scheduler.step().is_idle());
}

#[test]
fn test_slot_without_future_is_retired() {
    let kernel: Kernel = Kernel::new();
    let count = Cell::new(0);
    let handle = {
        let mut task = pin!(counter(&kernel, &count, 1));
        let mut scheduler = Scheduler::new(&kernel);
        scheduler.register(task.as_mut()).unwrap()
    };

    // a fresh scheduler holds no future for the admitted slot
    let mut scheduler = Scheduler::new(&kernel);
    assert_eq!(scheduler.step(), handle);
    assert_eq!(kernel.task_state(handle), Some(TaskState::Stopped));
    assert!(scheduler.step().is_idle());
    assert_eq!(count.get(), 0);
}

// =============================================================================
// Forced start / stop
// =============================================================================

#[test]
fn test_stopped_task_is_never_selected() {
    let kernel: Kernel = Kernel::new();
    let a = Cell::new(0);
    let b = Cell::new(0);
    let mut task_a = pin!(counter(&kernel, &a, 1));
    let mut task_b = pin!(counter(&kernel, &b, 1));

    let mut scheduler = Scheduler::new(&kernel);
    scheduler.register(task_a.as_mut()).unwrap();
    let handle_b = scheduler.register(task_b.as_mut()).unwrap();

    run_ticks(&kernel, &mut scheduler, 3);
    kernel.stop(handle_b).unwrap();
    run_ticks(&kernel, &mut scheduler, 5);

    assert_eq!(a.get(), 8);
    assert_eq!(b.get(), 3);
    assert_eq!(kernel.task_state(handle_b), Some(TaskState::Stopped));

    kernel.start(handle_b).unwrap();
    run_ticks(&kernel, &mut scheduler, 2);
    assert_eq!(b.get(), 5);
}

#[test]
fn test_task_stopping_itself_finishes_its_turn_only() {
    let kernel: Kernel = Kernel::new();
    let count = Cell::new(0);
    let mut task = pin!(stops_itself(&kernel, &count));

    let mut scheduler = Scheduler::new(&kernel);
    let handle = scheduler.register(task.as_mut()).unwrap();

    assert_eq!(scheduler.step(), handle);
    assert_eq!(count.get(), 1, "work after stop runs within the same turn");
    assert_eq!(kernel.task_state(handle), Some(TaskState::Stopped));

    run_ticks(&kernel, &mut scheduler, 10);
    assert_eq!(count.get(), 1);
    assert_eq!(kernel.task_state(handle), Some(TaskState::Stopped));
}

#[test]
fn test_stop_then_start_overrides_pending_wake() {
    let kernel: Kernel = Kernel::new();
    let count = Cell::new(0);
    let mut task = pin!(counter(&kernel, &count, 100));

    let mut scheduler = Scheduler::new(&kernel);
    let handle = scheduler.register(task.as_mut()).unwrap();

    run_ticks(&kernel, &mut scheduler, 1);
    assert_eq!(kernel.task_state(handle), Some(TaskState::Waiting));

    kernel.stop(handle).unwrap();
    kernel.start(handle).unwrap();
    assert_eq!(kernel.task_state(handle), Some(TaskState::Runnable));

    run_ticks(&kernel, &mut scheduler, 1);
    assert_eq!(count.get(), 2, "task resumed long before its wake tick");
}

#[test]
fn test_tick_does_not_wake_stopped_task() {
    let kernel: Kernel = Kernel::new();
    let count = Cell::new(0);
    let mut task = pin!(counter(&kernel, &count, 2));

    let mut scheduler = Scheduler::new(&kernel);
    let handle = scheduler.register(task.as_mut()).unwrap();

    run_ticks(&kernel, &mut scheduler, 1);
    kernel.stop(handle).unwrap();
    run_ticks(&kernel, &mut scheduler, 10);

    assert_eq!(count.get(), 1);
    assert_eq!(kernel.task_state(handle), Some(TaskState::Stopped));
}

// =============================================================================
// Mailbox
// =============================================================================

#[test]
fn test_mailbox_single_slot() {
    let mailbox: Mailbox<u8> = Mailbox::new();
    assert!(mailbox.is_empty());

    mailbox.try_post(1).unwrap();
    assert_eq!(mailbox.try_post(2), Err(MailboxError::Full));
    assert_eq!(mailbox.peek(), Some(1));
    assert_eq!(mailbox.peek(), Some(1), "peek leaves the message in place");

    mailbox.clear();
    assert!(mailbox.is_empty());
    mailbox.try_post(2).unwrap();
    assert_eq!(mailbox.peek(), Some(2));
}

#[test]
fn test_mailbox_post_waits_for_receiver() {
    let kernel: Kernel = Kernel::new();
    let mailbox: Mailbox<u8> = Mailbox::new();
    let received = RefCell::new(Vec::new());

    let mut sender = pin!(async {
        for n in 1..=3 {
            mailbox.post(&kernel, n).await.unwrap();
        }
    });
    let mut receiver = pin!(receive(&kernel, &mailbox, &received));

    let mut scheduler = Scheduler::new(&kernel);
    let handle = scheduler.register(sender.as_mut()).unwrap();
    scheduler.register(receiver.as_mut()).unwrap();

    run_until_stopped(&kernel, &mut scheduler, handle, 100);
    run_ticks(&kernel, &mut scheduler, 4);

    assert_eq!(*received.borrow(), vec![1, 2, 3]);
}

#[test]
fn test_mailbox_post_times_out() {
    let kernel: Kernel = Kernel::new();
    let mailbox: Mailbox<u8> = Mailbox::new();
    mailbox.try_post(7).unwrap();

    let result = block_on(&kernel, mailbox.post(&kernel, 8), 2 * MAILBOX_POST_LIMIT);

    assert_eq!(result, Err(MailboxError::Timeout));
    assert_eq!(mailbox.peek(), Some(7), "pending message is kept");
    assert!(kernel.now() >= MAILBOX_POST_LIMIT);
}
