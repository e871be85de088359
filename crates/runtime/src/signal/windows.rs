//! `Signal` backed by a Win32 manual-reset event, the same primitive the
//! teacher's `event::OwnedEventHandle` wraps and the original source's
//! `signal_win32` class multiplexes through the `signal_set`/`signal_unset`
//! completion keys.
use super::SignalWatch;
use crate::poll::notifier::{IoInterest, Watch};
use crate::poll::Scheduler;
use std::sync::Arc;
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
use windows_sys::Win32::System::Threading::{CreateEventW, ResetEvent, SetEvent};

pub struct Signal {
    handle: HANDLE,
    scheduler: Arc<Scheduler>,
}

unsafe impl Send for Signal {}
unsafe impl Sync for Signal {}

impl Signal {
    pub fn new(scheduler: Arc<Scheduler>) -> std::io::Result<Self> {
        let handle = unsafe { CreateEventW(std::ptr::null(), 1, 0, std::ptr::null()) };
        if handle == 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self { handle, scheduler })
    }

    pub fn set(&self) {
        unsafe {
            SetEvent(self.handle);
        }
    }

    pub fn unset(&self) {
        unsafe {
            ResetEvent(self.handle);
        }
    }

    pub fn watch(&self) -> SignalWatch {
        SignalWatch::new(self.scheduler.clone(), Watch::Handle(self.handle as _, IoInterest::Read))
    }
}

impl Drop for Signal {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.handle);
        }
    }
}
