//! notifier
//!
//! The contract every backend (readiness-family on unix, completion-family
//! on windows) implements. A `PollInfo` is the per-interest record: stable
//! identity, an optional timer deadline, the suspended continuation, and a
//! terminal status written at most once.
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Event,
    Timeout,
    Closed,
    Error,
}

/// Raw state of a `PollInfo`'s terminal status. `Unset` is the only state a
/// waiter may observe more than once; every other value is written exactly
/// once via compare-and-swap and is final.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawStatus {
    Unset = 0,
    Event = 1,
    Timeout = 2,
    Closed = 3,
    Error = 4,
}

impl RawStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RawStatus::Event,
            2 => RawStatus::Timeout,
            3 => RawStatus::Closed,
            4 => RawStatus::Error,
            _ => RawStatus::Unset,
        }
    }
}

/// The notifier's per-interest record. Shared between the caller's future
/// and the backend via `Arc`; the backend only ever touches it through the
/// raw pointer it was registered with, cast back from `Arc::as_ptr`, and
/// never outlives its `watch`/`unwatch` pair.
pub struct PollInfo {
    status: AtomicU8,
    waker: Mutex<Option<Waker>>,
    pub deadline: Option<Instant>,
}

impl PollInfo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU8::new(RawStatus::Unset as u8),
            waker: Mutex::new(None),
            deadline: None,
        })
    }

    pub fn with_deadline(deadline: Instant) -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU8::new(RawStatus::Unset as u8),
            waker: Mutex::new(None),
            deadline: Some(deadline),
        })
    }

    pub fn register(&self, waker: &Waker) {
        let mut slot = self.waker.lock();
        match slot.as_ref() {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    /// Write a terminal status exactly once. Returns `false` if a status was
    /// already written (late/duplicate event on an already-resumed or
    /// already-cancelled interest) so callers can silently drop the event.
    pub fn resolve(&self, status: PollStatus) -> bool {
        let raw = match status {
            PollStatus::Event => RawStatus::Event,
            PollStatus::Timeout => RawStatus::Timeout,
            PollStatus::Closed => RawStatus::Closed,
            PollStatus::Error => RawStatus::Error,
        };
        let won = self
            .status
            .compare_exchange(
                RawStatus::Unset as u8,
                raw as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            if let Some(waker) = self.waker.lock().take() {
                waker.wake();
            }
        }
        won
    }

    pub fn take_status(&self) -> Option<PollStatus> {
        match RawStatus::from_u8(self.status.load(Ordering::Acquire)) {
            RawStatus::Unset => None,
            RawStatus::Event => Some(PollStatus::Event),
            RawStatus::Timeout => Some(PollStatus::Timeout),
            RawStatus::Closed => Some(PollStatus::Closed),
            RawStatus::Error => Some(PollStatus::Error),
        }
    }

    /// Mark cancelled without racing a concurrent resolver: a cancel that
    /// loses the CAS means an event already landed and the caller will see
    /// it on the next poll instead.
    pub fn cancel(&self) {
        let _ = self.status.compare_exchange(
            RawStatus::Unset as u8,
            RawStatus::Closed as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl fmt::Debug for PollInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollInfo")
            .field("status", &self.take_status())
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Opaque identity for an interest registered with a `Notifier`. Tagged by
/// which registration table it came from (a plain `watch` vs. a
/// `watch_timer`) so `unwatch` can route to the right one without risking a
/// same-numbered key in the other — the two are independent id spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Watch(usize),
    Timer(u64),
}

/// Readiness direction a `watch` registers for, mirroring the `op ∈ {read,
/// write, readwrite}` vocabulary `poll` is specified against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoInterest {
    Read,
    Write,
    ReadWrite,
}

/// What is being watched: a readable/writable OS handle plus the interest
/// direction, or a bare timer with no associated handle (the completion
/// backend still needs a handle for everything else, but a pure `sleep()`
/// has none).
pub enum Watch {
    #[cfg(unix)]
    Fd(std::os::fd::RawFd, IoInterest),
    #[cfg(windows)]
    Handle(std::os::windows::io::RawHandle, IoInterest),
    TimerOnly,
}

/// The pluggable I/O notifier contract (C5). Implemented once per platform
/// family: `driver::unix::EpollNotifier` (readiness) and
/// `driver::windows::IocpNotifier` (completion).
pub trait Notifier {
    /// Register interest, returning a stable identity plus the shared
    /// `PollInfo` the caller's future should poll.
    fn watch(&self, watch: Watch, info: Arc<PollInfo>) -> Interest;

    /// Remove a previously registered interest. Idempotent: unwatching an
    /// already-fired or already-removed interest is a no-op.
    fn unwatch(&self, interest: Interest);

    /// Arm a timer, independent of `watch`; `unwatch` also cancels timers.
    fn watch_timer(&self, deadline: Instant, info: Arc<PollInfo>) -> Interest;

    /// Drain ready completions, driving their `PollInfo`s to a terminal
    /// status and waking any attached continuation. Blocks up to `timeout`
    /// (`None` = forever, `Some(Duration::ZERO)` = non-blocking poll).
    fn next_events(&self, timeout: Option<Duration>) -> usize;
}
