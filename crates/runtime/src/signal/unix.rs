//! eventfd-backed `Signal`. `set()` bumps the counter (making the fd
//! readable); `unset()` drains it. Level-triggered: any `watch()` issued
//! while the counter is non-zero resolves immediately.
use super::SignalWatch;
use crate::poll::notifier::{IoInterest, Watch};
use crate::poll::Scheduler;
use std::os::fd::RawFd;
use std::sync::Arc;

pub struct Signal {
    fd: RawFd,
    scheduler: Arc<Scheduler>,
}

impl Signal {
    pub fn new(scheduler: Arc<Scheduler>) -> std::io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self { fd, scheduler })
    }

    pub fn set(&self) {
        let one: u64 = 1;
        unsafe {
            libc::write(self.fd, &one as *const u64 as *const _, 8);
        }
    }

    pub fn unset(&self) {
        let mut buf: u64 = 0;
        unsafe {
            libc::read(self.fd, &mut buf as *mut u64 as *mut _, 8);
        }
    }

    pub fn watch(&self) -> SignalWatch {
        SignalWatch::new(self.scheduler.clone(), Watch::Fd(self.fd, IoInterest::Read))
    }
}

impl Drop for Signal {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::Scheduler;

    #[test]
    fn set_is_idempotent_and_one_unset_drains_it() {
        let scheduler = Scheduler::new().unwrap();
        let signal = Signal::new(scheduler).unwrap();

        signal.set();
        signal.set();
        signal.set();
        signal.unset();

        let mut buf: u64 = 0;
        let n = unsafe { libc::read(signal.fd, &mut buf as *mut u64 as *mut _, 8) };
        assert_eq!(n, -1, "a single unset() drains whatever accumulated from repeated set()");
    }
}
