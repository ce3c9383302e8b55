//! Bounded waits on a monotonic clock.
//!
//! Every waiting operation takes an explicit budget. Zero and
//! over-long budgets are rejected up front; there is no "wait forever".
//! Expiry is reported as a [`Wakeup`], never as an error.

use std::time::Duration;

use act_core::{ActError, ActResult};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A validated wait budget anchored at the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Start a budget of `budget` now. `max` is the configured ceiling.
    pub fn after(budget: Duration, max: Duration) -> ActResult<Self> {
        if budget.is_zero() || budget > max {
            return Err(ActError::InvalidWait {
                requested: budget,
                max,
            });
        }

        let started = Instant::now();
        Ok(Deadline {
            started,
            at: started + budget,
            budget,
        })
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Why a wait returned.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wakeup {
    /// The watched buffer changed; rescan it.
    Appended,
    Expired,
    Cancelled,
}

/// Wait for the next change on `rx`, the deadline, or cancellation.
///
/// Callers must mark the current value seen (`borrow_and_update`)
/// before scanning, so an append racing the scan still wakes them.
pub async fn wait_for_append(
    rx: &mut watch::Receiver<usize>,
    deadline: &Deadline,
    cancel: &CancellationToken,
) -> Wakeup {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Wakeup::Cancelled,
        Ok(()) = rx.changed() => Wakeup::Appended,
        _ = tokio::time::sleep_until(deadline.instant()) => Wakeup::Expired,
    }
}

/// Sit out the whole budget unless cancelled first.
pub async fn wait_out(deadline: &Deadline, cancel: &CancellationToken) -> Wakeup {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Wakeup::Cancelled,
        _ = tokio::time::sleep_until(deadline.instant()) => Wakeup::Expired,
    }
}
