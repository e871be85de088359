//! N-party rendezvous built on the same countdown idiom `task::join_all`
//! uses for joining children, generalized to wake every party rather than
//! a single `block_on` root waker.
use super::latch;
use super::Latch;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

struct Inner {
    arrived: Mutex<usize>,
    parties: usize,
    latch: Latch,
}

#[derive(Clone)]
pub struct Barrier {
    inner: Arc<Inner>,
}

impl Barrier {
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "a barrier needs at least one party");
        Self {
            inner: Arc::new(Inner {
                arrived: Mutex::new(0),
                parties,
                latch: Latch::new(),
            }),
        }
    }

    pub fn wait(&self) -> Wait {
        Wait {
            inner: self.inner.clone(),
            counted: false,
            latch_wait: None,
        }
    }
}

pub struct Wait {
    inner: Arc<Inner>,
    counted: bool,
    // Registered once and reused across polls: a fresh `latch::Wait` per
    // poll would register (and then drop) a new waker every call, losing
    // any earlier party's registered waker out from under it.
    latch_wait: Option<latch::Wait>,
}

impl Future for Wait {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.counted {
            self.counted = true;
            let mut arrived = self.inner.arrived.lock();
            *arrived += 1;
            if *arrived == self.inner.parties {
                self.inner.latch.count_down();
            }
        }
        if self.latch_wait.is_none() {
            self.latch_wait = Some(self.inner.latch.wait());
        }
        let latch_wait = self.latch_wait.as_mut().unwrap();
        Pin::new(latch_wait).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;

    #[test]
    fn releases_once_all_parties_arrive() {
        let barrier = Barrier::new(2);
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut a = Box::pin(barrier.wait());
        assert_eq!(a.as_mut().poll(&mut cx), Poll::Pending);

        let mut b = Box::pin(barrier.wait());
        assert_eq!(b.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(a.as_mut().poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn three_parties_all_wake_once_the_last_arrives() {
        let barrier = Barrier::new(3);
        let mut cx = Context::from_waker(noop_waker_ref());

        // Each party polls once and parks before the next one arrives, so
        // every earlier waker must still be registered when the barrier
        // finally releases — the bug this guards against silently dropped
        // all but the most recently registered waiter.
        let mut a = Box::pin(barrier.wait());
        assert_eq!(a.as_mut().poll(&mut cx), Poll::Pending);

        let mut b = Box::pin(barrier.wait());
        assert_eq!(b.as_mut().poll(&mut cx), Poll::Pending);

        let mut c = Box::pin(barrier.wait());
        assert_eq!(c.as_mut().poll(&mut cx), Poll::Ready(()));

        assert_eq!(a.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(b.as_mut().poll(&mut cx), Poll::Ready(()));
    }
}
