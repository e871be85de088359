//! completion-family notifier (IOCP), ported from the teacher's
//! `io::overlapped`/`io::drive`/`io::handle` plus the three completion keys
//! (`socket`, `timer`, `signal`) documented in the original source's
//! `io_notifier_iocp.cpp`.
use crate::poll::notifier::{Interest, Notifier, PollInfo, PollStatus, Watch};
use parking_lot::Mutex;
use slab::Slab;
use std::collections::HashMap;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::System::IO::{CreateIoCompletionPort, GetQueuedCompletionStatus};
use windows_sys::Win32::System::Threading::{
    CreateWaitableTimerW, RegisterWaitForSingleObject, SetWaitableTimer, INFINITE,
    WT_EXECUTEONLYONCE,
};

/// Completion keys multiplexed over the single IOCP handle, mirroring the
/// original source's `completion_key` enum.
const KEY_SOCKET: usize = 1;
const KEY_TIMER: usize = 2;

struct TimerEntry {
    info: Arc<PollInfo>,
    /// Set by the wait callback just before posting the completion, cleared
    /// by the consumer after reading it. The release/acquire pair here
    /// mirrors the original source's documented fence around the timer
    /// back-pointer, avoiding a race between the wait callback and the
    /// thread draining `next_events`.
    fired: AtomicPtr<()>,
}

pub struct IocpNotifier {
    port: HANDLE,
    sockets: Mutex<Slab<Arc<PollInfo>>>,
    // Timer ids are a monotonic counter, not a recycled slab key: a timer
    // cancelled after its waitable timer already fired but before the
    // completion is drained must not be confused with a later timer that
    // reused the same numeric key.
    timers: Mutex<HashMap<u64, Arc<TimerEntry>>>,
    next_timer_id: AtomicU64,
}

unsafe impl Send for IocpNotifier {}
unsafe impl Sync for IocpNotifier {}

impl IocpNotifier {
    pub fn new() -> std::io::Result<Self> {
        let port = unsafe { CreateIoCompletionPort(INVALID_HANDLE_VALUE, 0, 0, 0) };
        if port == 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self {
            port,
            sockets: Mutex::new(Slab::new()),
            timers: Mutex::new(HashMap::new()),
            next_timer_id: AtomicU64::new(0),
        })
    }
}

impl Drop for IocpNotifier {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.port) };
    }
}

impl Notifier for IocpNotifier {
    fn watch(&self, watch: Watch, info: Arc<PollInfo>) -> Interest {
        // Completion-based registration doesn't distinguish readable from
        // writable interest; the direction is implied by which overlapped
        // operation the caller issues on `handle`.
        let Watch::Handle(handle, _interest) = watch else {
            panic!("windows notifier requires Watch::Handle");
        };
        let mut sockets = self.sockets.lock();
        let key = sockets.insert(info);
        // SAFETY: `handle` outlives this registration; callers attach
        // before issuing the overlapped operation and detach via `unwatch`.
        // `FILE_SKIP_COMPLETION_PORT_ON_SUCCESS` is intentionally *not* set
        // here: unlike the teacher's single-owner `Drive`, interests here
        // may be shared, so synchronous completions are still routed
        // through the port rather than raced against frame teardown.
        unsafe {
            CreateIoCompletionPort(handle as HANDLE, self.port, KEY_SOCKET + key, 0);
        }
        Interest::Watch(key)
    }

    fn unwatch(&self, interest: Interest) {
        match interest {
            Interest::Watch(key) => {
                if let Some(info) = self.sockets.lock().try_remove(key) {
                    info.cancel();
                }
            }
            Interest::Timer(id) => {
                if let Some(entry) = self.timers.lock().remove(&id) {
                    entry.info.cancel();
                }
            }
        }
    }

    fn watch_timer(&self, deadline: Instant, info: Arc<PollInfo>) -> Interest {
        let entry = Arc::new(TimerEntry {
            info,
            fired: AtomicPtr::new(std::ptr::null_mut()),
        });
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        self.timers.lock().insert(id, entry.clone());

        let due_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as i64;
        let mut due = -(due_ms.max(0) * 10_000); // relative, 100ns units
        unsafe {
            let timer = CreateWaitableTimerW(std::ptr::null(), 1, std::ptr::null());
            if timer != 0 {
                SetWaitableTimer(timer, &mut due, 0, None, std::ptr::null(), 0);
                let ctx = Box::into_raw(Box::new(TimerWaitCtx {
                    port: self.port,
                    key: KEY_TIMER,
                    id,
                }));
                let mut wait_handle: HANDLE = 0;
                // Release: the completion key/id captured in `ctx` must be
                // visible to the wait-pool thread that runs
                // `timer_wait_callback` before it posts to the port.
                entry.fired.store(ctx as *mut (), Ordering::Release);
                RegisterWaitForSingleObject(
                    &mut wait_handle,
                    timer,
                    Some(timer_wait_callback),
                    ctx as *const _,
                    INFINITE,
                    WT_EXECUTEONLYONCE,
                );
            }
        }
        Interest::Timer(id)
    }

    fn next_events(&self, timeout: Option<Duration>) -> usize {
        let ms = match timeout {
            None => INFINITE,
            Some(d) => d.as_millis() as u32,
        };
        let mut bytes = 0u32;
        let mut key: usize = 0;
        let mut overlapped = std::ptr::null_mut();
        let ok = unsafe {
            GetQueuedCompletionStatus(self.port, &mut bytes, &mut key, &mut overlapped, ms)
        };
        if ok == 0 {
            return 0;
        }
        let mut count = 0;
        if key == KEY_TIMER {
            // The timer id travels as the completion's `overlapped` slot
            // (cast back from the pointer `timer_wait_callback` posted),
            // since the completion key itself is shared by every timer.
            let id = overlapped as usize as u64;
            let entry = self.timers.lock().remove(&id);
            if let Some(entry) = entry {
                // Acquire pairs with the Release store in `watch_timer`,
                // ensuring the boxed wait context is fully visible before we
                // free it here.
                let ctx = entry.fired.load(Ordering::Acquire);
                if !ctx.is_null() {
                    drop(unsafe { Box::from_raw(ctx as *mut TimerWaitCtx) });
                }
                if entry.info.resolve(PollStatus::Timeout) {
                    count += 1;
                }
            }
        } else if key >= KEY_SOCKET {
            let slot = key - KEY_SOCKET;
            let info = self.sockets.lock().get(slot).cloned();
            if let Some(info) = info {
                if info.resolve(PollStatus::Event) {
                    count += 1;
                }
            }
        }
        count
    }
}

struct TimerWaitCtx {
    port: HANDLE,
    key: usize,
    id: u64,
}

/// Runs on a wait-pool thread when the waitable timer fires. Posts a
/// synthetic completion keyed `timer`, with the timer's id riding in the
/// `lpOverlapped` slot so `next_events` can look it up without a second,
/// potentially-ABA-prone key namespace. Mirrors the original source's
/// `watch_timer` callback posting via `PostQueuedCompletionStatus`. The boxed
/// `TimerWaitCtx` is reclaimed by `next_events` once the completion is
/// observed.
unsafe extern "system" fn timer_wait_callback(ctx: *mut std::ffi::c_void, _timed_out: u8) {
    let ctx = &*(ctx as *const TimerWaitCtx);
    windows_sys::Win32::System::IO::PostQueuedCompletionStatus(
        ctx.port,
        0,
        ctx.key,
        ctx.id as usize as *mut _,
    );
}
