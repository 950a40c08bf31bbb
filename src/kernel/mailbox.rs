//! Single-slot mailbox
//!
//! At most one outstanding message. A sender polls with one-tick sleeps
//! until the slot is free; the receiver clears the slot after processing.

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

use super::Kernel;
use crate::config::MAILBOX_POST_LIMIT;
use crate::log_warn;

/// Mailbox errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// Slot already holds a message
    Full,
    /// Slot stayed occupied for the whole post bound
    Timeout,
}

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("mailbox full"),
            Self::Timeout => f.write_str("mailbox post timed out"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for MailboxError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Full => defmt::write!(f, "Full"),
            Self::Timeout => defmt::write!(f, "Timeout"),
        }
    }
}

/// Single-slot command handoff between tasks
pub struct Mailbox<T: Copy> {
    slot: Mutex<Cell<Option<T>>>,
}

impl<T: Copy> Mailbox<T> {
    /// Create an empty mailbox
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    /// Place a message if the slot is free
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Full`] if a message is still pending.
    pub fn try_post(&self, message: T) -> Result<(), MailboxError> {
        critical_section::with(|cs| {
            let slot = self.slot.borrow(cs);
            if slot.get().is_some() {
                Err(MailboxError::Full)
            } else {
                slot.set(Some(message));
                Ok(())
            }
        })
    }

    /// Wait for the slot to become free, post, then yield
    ///
    /// Polls once per tick for at most `MAILBOX_POST_LIMIT` ticks.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Timeout`] and drops the message if the slot
    /// never frees up.
    pub async fn post<const N: usize>(&self, kernel: &Kernel<N>, message: T) -> Result<(), MailboxError> {
        for _ in 0..MAILBOX_POST_LIMIT {
            if self.try_post(message).is_ok() {
                kernel.sleep(0).await;
                return Ok(());
            }
            kernel.sleep(1).await;
        }
        log_warn!("mailbox post timed out");
        Err(MailboxError::Timeout)
    }

    /// Pending message, left in place
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        critical_section::with(|cs| self.slot.borrow(cs).get())
    }

    /// Release the slot
    pub fn clear(&self) {
        critical_section::with(|cs| self.slot.borrow(cs).set(None));
    }

    /// Check whether the slot is free
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peek().is_none()
    }
}

impl<T: Copy> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
