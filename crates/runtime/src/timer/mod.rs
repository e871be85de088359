//! timer
//!
//! Timer handle (C4): an OS-backed wakeup source that can be armed with a
//! relative or absolute deadline, cancelled, and re-armed. Backed by the
//! same `Notifier::watch_timer` heap `poll::Scheduler::sleep`/`sleep_until`
//! use internally; generalizes the teacher's `OwnedTimerHandle`
//! (`CreateThreadpoolTimer`/`SetThreadpoolTimer`/`CloseThreadpoolTimer`) from
//! a Win32-only primitive to the portable notifier contract.
use crate::poll::notifier::{Interest, PollInfo, PollStatus};
use crate::poll::Scheduler;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

struct Armed {
    info: Arc<PollInfo>,
    interest: Interest,
}

/// Opaque, re-armable OS timer. Carries back-references to the scheduler's
/// notifier and to its current `PollInfo`, neither of which it owns — the
/// scheduler owns both, this handle only borrows. Dropping it cancels
/// whatever deadline is still armed.
pub struct TimerHandle {
    scheduler: Arc<Scheduler>,
    armed: Mutex<Option<Armed>>,
}

impl TimerHandle {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self {
            scheduler,
            armed: Mutex::new(None),
        }
    }

    /// Arm with a relative duration from now, replacing any still-armed
    /// deadline.
    pub fn arm(&self, duration: Duration) {
        self.arm_at(Instant::now() + duration);
    }

    /// Arm with an absolute deadline, replacing any still-armed deadline.
    pub fn arm_at(&self, deadline: Instant) {
        self.cancel();
        let info = PollInfo::with_deadline(deadline);
        let interest = self.scheduler.notifier().watch_timer(deadline, info.clone());
        *self.armed.lock() = Some(Armed { info, interest });
    }

    /// Cancel a still-armed deadline. A no-op if unarmed or already fired.
    pub fn cancel(&self) {
        if let Some(armed) = self.armed.lock().take() {
            self.scheduler.notifier().unwatch(armed.interest);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().is_some()
    }

    /// Await the deadline from the current arm. Panics if called before
    /// `arm`/`arm_at` — callers own the ordering, the handle doesn't guess.
    pub fn wait(&self) -> TimerWait {
        let info = self
            .armed
            .lock()
            .as_ref()
            .expect("TimerHandle::wait called before arm")
            .info
            .clone();
        TimerWait { info }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct TimerWait {
    info: Arc<PollInfo>,
}

impl Future for TimerWait {
    type Output = PollStatus;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(status) = self.info.take_status() {
            return Poll::Ready(status);
        }
        self.info.register(cx.waker());
        match self.info.take_status() {
            Some(status) => Poll::Ready(status),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::block_on;

    #[test]
    fn fires_after_its_duration_elapses() {
        let scheduler = Scheduler::new().unwrap();
        let timer = TimerHandle::new(scheduler);
        timer.arm(Duration::from_millis(10));
        assert_eq!(block_on(timer.wait()), PollStatus::Timeout);
    }

    #[test]
    fn re_arming_replaces_the_previous_deadline() {
        let scheduler = Scheduler::new().unwrap();
        let timer = TimerHandle::new(scheduler);
        timer.arm(Duration::from_secs(60));
        assert!(timer.is_armed());
        timer.arm(Duration::from_millis(10));
        assert_eq!(block_on(timer.wait()), PollStatus::Timeout);
    }

    #[test]
    fn cancel_unarms_without_firing() {
        let scheduler = Scheduler::new().unwrap();
        let timer = TimerHandle::new(scheduler);
        timer.arm(Duration::from_secs(60));
        timer.cancel();
        assert!(!timer.is_armed());
    }
}
