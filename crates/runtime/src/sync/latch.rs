//! single-fire binary latch, backing `task::block_on` and `Barrier`.
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Default)]
struct Shared {
    waiters: Mutex<Vec<Waker>>,
    fired: AtomicBool,
}

/// A one-shot gate: any number of tasks may `.wait()` on it, all are woken
/// the moment `.count_down()` is called, and subsequent waits resolve
/// immediately.
#[derive(Clone)]
pub struct Latch {
    shared: Arc<Shared>,
}

impl Latch {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn count_down(&self) {
        self.shared.fired.store(true, Ordering::Release);
        let waiters = std::mem::take(&mut *self.shared.waiters.lock());
        for waker in waiters {
            waker.wake();
        }
    }

    pub fn is_set(&self) -> bool {
        self.shared.fired.load(Ordering::Acquire)
    }

    pub fn wait(&self) -> Wait {
        Wait {
            shared: self.shared.clone(),
            registered: false,
        }
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Wait {
    shared: Arc<Shared>,
    registered: bool,
}

impl Future for Wait {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.shared.fired.load(Ordering::Acquire) {
            return Poll::Ready(());
        }
        if !self.registered {
            self.shared.waiters.lock().push(cx.waker().clone());
            self.registered = true;
        }
        // Re-check: `count_down` may have fired between the check above and
        // registering the waker.
        if self.shared.fired.load(Ordering::Acquire) {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;

    #[test]
    fn wait_resolves_after_count_down() {
        let latch = Latch::new();
        let mut wait = Box::pin(latch.wait());
        let mut cx = Context::from_waker(noop_waker_ref());
        assert_eq!(wait.as_mut().poll(&mut cx), Poll::Pending);
        latch.count_down();
        assert_eq!(wait.as_mut().poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn wait_after_fire_resolves_immediately() {
        let latch = Latch::new();
        latch.count_down();
        let mut wait = Box::pin(latch.wait());
        let mut cx = Context::from_waker(noop_waker_ref());
        assert_eq!(wait.as_mut().poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn every_registered_waiter_is_woken_once() {
        let latch = Latch::new();
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut a = Box::pin(latch.wait());
        let mut b = Box::pin(latch.wait());
        let mut c = Box::pin(latch.wait());
        assert_eq!(a.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(b.as_mut().poll(&mut cx), Poll::Pending);
        assert_eq!(c.as_mut().poll(&mut cx), Poll::Pending);

        latch.count_down();

        // Every waiter resolves, not just the most recently registered one.
        assert_eq!(a.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(b.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(c.as_mut().poll(&mut cx), Poll::Ready(()));
    }
}
