use std::future::pending;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// One logical timer: at most one deadline, replaced on every re-arm.
///
/// The slot never spawns anything. The owning task awaits `expired` inside its
/// `select!`, so re-arming or cancelling takes effect on the next loop turn.
#[derive(Debug, Default)]
pub struct TimerSlot {
    deadline: Option<Instant>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm_at(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves at the deadline; never resolves while disarmed.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending::<()>().await,
        }
    }
}

/// Which completion timer woke the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// No valid burst for the settle window.
    Settle,
    /// Absolute transaction timeout.
    Deadline,
}

/// The settle and absolute-timeout timers of the active transaction.
#[derive(Debug)]
pub struct CompletionScheduler {
    settle_window: Duration,
    timeout: Duration,
    settle: TimerSlot,
    deadline: TimerSlot,
}

impl CompletionScheduler {
    pub fn new(settle_window: Duration, timeout: Duration) -> Self {
        Self {
            settle_window,
            timeout,
            settle: TimerSlot::new(),
            deadline: TimerSlot::new(),
        }
    }

    /// Arms both timers for a transaction that started at `now`.
    pub fn start(&mut self, now: Instant) {
        self.deadline.arm_at(now + self.timeout);
        self.settle.arm_at(now + self.settle_window);
    }

    /// Pushes the settle deadline out after a valid burst.
    pub fn restart_settle(&mut self, now: Instant) {
        self.settle.arm_at(now + self.settle_window);
    }

    pub fn cancel_all(&mut self) {
        self.settle.cancel();
        self.deadline.cancel();
    }

    pub fn is_idle(&self) -> bool {
        !self.settle.is_armed() && !self.deadline.is_armed()
    }

    pub fn settle_deadline(&self) -> Option<Instant> {
        self.settle.deadline()
    }

    pub fn transaction_deadline(&self) -> Option<Instant> {
        self.deadline.deadline()
    }

    /// Waits for whichever armed timer is due first and disarms it.
    ///
    /// The absolute deadline wins when both are due at the same instant.
    pub async fn next(&mut self) -> Wake {
        let wake = tokio::select! {
            biased;
            _ = self.deadline.expired() => Wake::Deadline,
            _ = self.settle.expired() => Wake::Settle,
        };
        match wake {
            Wake::Deadline => self.deadline.cancel(),
            Wake::Settle => self.settle.cancel(),
        }
        wake
    }
}
