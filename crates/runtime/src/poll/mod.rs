//! poll
//!
//! The I/O scheduler (C6): owns a `Notifier` plus an optional `ThreadPool`
//! and drives the six-step poll algorithm (check terminal status, register
//! interest if unset, possibly arm a timer, hand off to the notifier,
//! resolve, and resume). Two notifier backends exist behind the same
//! `Notifier` trait: `driver::unix::EpollNotifier` (readiness family) and
//! `driver::windows::IocpNotifier` (completion family).
pub mod driver;
pub mod notifier;

use crate::error::Result;
use crate::pool::ThreadPool;
use notifier::{Interest, Notifier, PollInfo, PollStatus, Watch};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[cfg(unix)]
type PlatformNotifier = driver::unix::EpollNotifier;
#[cfg(windows)]
type PlatformNotifier = driver::windows::IocpNotifier;

/// How long the background driver thread blocks in `next_events` between
/// checking whether the scheduler is shutting down.
const DRIVER_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Scheduler {
    notifier: PlatformNotifier,
    pool: Option<Arc<ThreadPool>>,
    running: Arc<AtomicBool>,
    driver: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Result<Arc<Self>> {
        Self::build(None)
    }

    pub fn with_pool(pool: Arc<ThreadPool>) -> Result<Arc<Self>> {
        Self::build(Some(pool))
    }

    fn build(pool: Option<Arc<ThreadPool>>) -> Result<Arc<Self>> {
        let scheduler = Arc::new(Self {
            notifier: PlatformNotifier::new()?,
            pool,
            running: Arc::new(AtomicBool::new(true)),
            driver: parking_lot::Mutex::new(None),
        });
        let weak = Arc::downgrade(&scheduler);
        let running = scheduler.running.clone();
        let handle = std::thread::Builder::new()
            .name("coro-reactor".into())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    let Some(scheduler) = weak.upgrade() else { break };
                    scheduler.notifier.next_events(Some(DRIVER_POLL_INTERVAL));
                }
            })
            .expect("spawn reactor thread");
        *scheduler.driver.lock() = Some(handle);
        Ok(scheduler)
    }

    pub fn notifier(&self) -> &dyn Notifier {
        &self.notifier
    }

    /// Drain at least one ready completion, blocking up to `timeout`.
    /// Returns the number of continuations that were resumed.
    pub fn run_once(&self, timeout: Option<Duration>) -> usize {
        self.notifier.next_events(timeout)
    }

    /// Suspend the current task until `duration` has elapsed.
    pub fn sleep(self: &Arc<Self>, duration: Duration) -> Sleep {
        self.sleep_until(Instant::now() + duration)
    }

    pub fn sleep_until(self: &Arc<Self>, deadline: Instant) -> Sleep {
        Sleep {
            scheduler: self.clone(),
            deadline,
            info: None,
            interest: None,
        }
    }

    /// Yield once, giving the pool's other runnables a chance to run.
    pub fn yield_now(self: &Arc<Self>) -> YieldNow {
        YieldNow { yielded: false }
    }

    /// Resume `f` on the configured pool, or run it inline if none is set
    /// (the single-threaded/foreground configuration).
    pub fn schedule_after<F>(self: &Arc<Self>, duration: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Held for the sleep's duration so the scheduler (and its driver
        // thread) can't be torn down out from under an in-flight timer.
        let scheduler = self.clone();
        let pool = self.pool.clone();
        std::thread::Builder::new()
            .name("coro-timer".into())
            .spawn(move || {
                std::thread::sleep(duration);
                drop(scheduler);
                match pool {
                    Some(pool) => pool.execute(f),
                    None => f(),
                }
            })
            .expect("spawn timer thread");
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.driver.lock().take() {
            let _ = handle.join();
        }
    }
}

pub struct Sleep {
    scheduler: Arc<Scheduler>,
    deadline: Instant,
    info: Option<Arc<PollInfo>>,
    interest: Option<Interest>,
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(interest) = self.interest.take() {
            self.scheduler.notifier().unwatch(interest);
        }
    }
}

impl Future for Sleep {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.info.is_none() {
            if Instant::now() >= self.deadline {
                return Poll::Ready(());
            }
            let info = PollInfo::with_deadline(self.deadline);
            info.register(cx.waker());
            let interest = self.scheduler.notifier().watch_timer(self.deadline, info.clone());
            self.info = Some(info);
            self.interest = Some(interest);
            return Poll::Pending;
        }
        let info = self.info.as_ref().unwrap();
        match info.take_status() {
            Some(PollStatus::Timeout) | Some(PollStatus::Event) => Poll::Ready(()),
            _ => {
                info.register(cx.waker());
                Poll::Pending
            }
        }
    }
}

pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Await a raw OS readiness/completion event on `watch`, resolving to the
/// terminal `PollStatus` (the six-step algorithm's outer contract).
pub fn poll(scheduler: Arc<Scheduler>, watch: Watch, timeout: Option<Duration>) -> PollIo {
    PollIo {
        scheduler,
        watch: Some(watch),
        deadline: timeout.map(|t| Instant::now() + t),
        info: None,
        watch_interest: None,
        timer_interest: None,
    }
}

pub struct PollIo {
    scheduler: Arc<Scheduler>,
    watch: Option<Watch>,
    deadline: Option<Instant>,
    info: Option<Arc<PollInfo>>,
    watch_interest: Option<Interest>,
    timer_interest: Option<Interest>,
}

impl Future for PollIo {
    type Output = PollStatus;
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(info) = &self.info {
            if let Some(status) = info.take_status() {
                return Poll::Ready(status);
            }
            info.register(cx.waker());
            return Poll::Pending;
        }
        let info = match self.deadline {
            Some(d) => PollInfo::with_deadline(d),
            None => PollInfo::new(),
        };
        info.register(cx.waker());
        let watch = self.watch.take().expect("polled after completion");
        let watch_interest = self.scheduler.notifier().watch(watch, info.clone());
        self.watch_interest = Some(watch_interest);
        if let Some(deadline) = self.deadline {
            let timer_interest = self.scheduler.notifier().watch_timer(deadline, info.clone());
            self.timer_interest = Some(timer_interest);
        }
        self.info = Some(info);
        Poll::Pending
    }
}

impl Drop for PollIo {
    fn drop(&mut self) {
        if let Some(interest) = self.watch_interest.take() {
            self.scheduler.notifier().unwatch(interest);
        }
        if let Some(interest) = self.timer_interest.take() {
            self.scheduler.notifier().unwatch(interest);
        }
    }
}
