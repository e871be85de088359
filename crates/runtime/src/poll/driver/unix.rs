//! readiness-family notifier (epoll/kqueue), modelled on async-io's Reactor:
//! a `Slab` of registered fd sources plus a `BinaryHeap` timer wheel, both
//! behind one poller lock. Timer ids are a monotonic counter rather than a
//! recycled slab key, so a timer cancelled after it's already due but before
//! `fire_due_timers` observes it can never be confused with a later timer
//! that happened to reuse the same numeric key.
use crate::poll::notifier::{Interest, IoInterest, Notifier, PollInfo, PollStatus, Watch};
use parking_lot::Mutex;
use polling::{Event, Events, PollMode, Poller};
use slab::Slab;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Source {
    info: Arc<PollInfo>,
}

struct TimerEntry {
    deadline: Instant,
    id: u64,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}
impl Eq for TimerEntry {}
impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want the earliest deadline first.
        Reverse(self.deadline).cmp(&Reverse(other.deadline)).then(self.id.cmp(&other.id))
    }
}

pub struct EpollNotifier {
    poller: Poller,
    sources: Mutex<Slab<Source>>,
    timers: Mutex<BinaryHeap<TimerEntry>>,
    timer_infos: Mutex<HashMap<u64, Arc<PollInfo>>>,
    next_timer_id: AtomicU64,
}

impl EpollNotifier {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            poller: Poller::new()?,
            sources: Mutex::new(Slab::new()),
            timers: Mutex::new(BinaryHeap::new()),
            timer_infos: Mutex::new(HashMap::new()),
            next_timer_id: AtomicU64::new(0),
        })
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.lock().peek().map(|t| t.deadline)
    }

    fn fire_due_timers(&self, count: &mut usize) {
        let now = Instant::now();
        loop {
            let due_id = {
                let mut timers = self.timers.lock();
                match timers.peek() {
                    Some(t) if t.deadline <= now => timers.pop().map(|t| t.id),
                    _ => None,
                }
            };
            let Some(id) = due_id else { break };
            // A cancelled timer is removed from `timer_infos` by `unwatch`,
            // so a stale heap entry for it resolves to `None` here instead of
            // firing against whatever unrelated timer reused the id.
            let info = self.timer_infos.lock().remove(&id);
            if let Some(info) = info {
                if info.resolve(PollStatus::Timeout) {
                    *count += 1;
                }
            }
        }
    }
}

impl Notifier for EpollNotifier {
    fn watch(&self, watch: Watch, info: Arc<PollInfo>) -> Interest {
        let Watch::Fd(fd, interest) = watch else {
            panic!("unix notifier requires Watch::Fd");
        };
        let mut sources = self.sources.lock();
        let key = sources.insert(Source { info });
        let event = match interest {
            IoInterest::Read => Event::readable(key),
            IoInterest::Write => Event::writable(key),
            IoInterest::ReadWrite => Event::all(key),
        };
        // SAFETY: `fd` is owned by the caller for at least as long as the
        // interest is registered; the caller unregisters before closing it.
        unsafe {
            self.poller
                .add_with_mode(fd, event, PollMode::Oneshot)
                .expect("poller registration");
        }
        Interest::Watch(key)
    }

    fn unwatch(&self, interest: Interest) {
        match interest {
            Interest::Watch(key) => {
                if let Some(source) = self.sources.lock().try_remove(key) {
                    source.info.cancel();
                }
            }
            Interest::Timer(id) => {
                if let Some(info) = self.timer_infos.lock().remove(&id) {
                    info.cancel();
                }
            }
        }
    }

    fn watch_timer(&self, deadline: Instant, info: Arc<PollInfo>) -> Interest {
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        self.timer_infos.lock().insert(id, info);
        self.timers.lock().push(TimerEntry { deadline, id });
        Interest::Timer(id)
    }

    fn next_events(&self, timeout: Option<Duration>) -> usize {
        let mut events = Events::new();
        let wait = match (timeout, self.next_deadline()) {
            (Some(t), Some(d)) => Some(t.min(d.saturating_duration_since(Instant::now()))),
            (Some(t), None) => Some(t),
            (None, Some(d)) => Some(d.saturating_duration_since(Instant::now())),
            (None, None) => None,
        };
        let _ = self.poller.wait(&mut events, wait);
        let mut count = 0;
        for event in events.iter() {
            let key = event.key;
            let info = {
                let sources = self.sources.lock();
                sources.get(key).map(|s| s.info.clone())
            };
            if let Some(info) = info {
                let status = if event.is_err().unwrap_or(false) {
                    PollStatus::Error
                } else {
                    PollStatus::Event
                };
                if info.resolve(status) {
                    count += 1;
                }
            }
        }
        self.fire_due_timers(&mut count);
        count
    }
}
