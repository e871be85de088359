//! signal
//!
//! Cross-platform level-triggered wakeup (C3). `Signal` owns the set/unset
//! side; `watch()` returns an awaitable `SignalWatch`. Mirrors the split
//! between `OwnedEventHandle` (set/reset) and `BorrowedEventHandle` (wait)
//! in the teacher's `event` module, and the `set()`/`unset()` contract of
//! `signal_win32` in the original source.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::Signal;
#[cfg(windows)]
pub use windows::Signal;

use crate::poll::notifier::{Interest, PollInfo, PollStatus, Watch};
use crate::poll::Scheduler;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// An awaitable view onto a `Signal`. Registers its interest with the
/// scheduler's notifier on first poll and unregisters on drop, so a
/// cancelled `.watch().await` never leaks an interest slot.
pub struct SignalWatch {
    scheduler: Arc<Scheduler>,
    watch: Watch,
    info: Arc<PollInfo>,
    interest: Option<Interest>,
}

impl SignalWatch {
    pub(crate) fn new(scheduler: Arc<Scheduler>, watch: Watch) -> Self {
        Self {
            scheduler,
            watch,
            info: PollInfo::new(),
            interest: None,
        }
    }
}

impl Future for SignalWatch {
    type Output = PollStatus;
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(status) = self.info.take_status() {
            return Poll::Ready(status);
        }
        self.info.register(cx.waker());
        if self.interest.is_none() {
            let watch = std::mem::replace(&mut self.watch, Watch::TimerOnly);
            self.interest = Some(self.scheduler.notifier().watch(watch, self.info.clone()));
        }
        if let Some(status) = self.info.take_status() {
            return Poll::Ready(status);
        }
        Poll::Pending
    }
}

impl Drop for SignalWatch {
    fn drop(&mut self) {
        if let Some(interest) = self.interest.take() {
            self.scheduler.notifier().unwatch(interest);
        }
    }
}
