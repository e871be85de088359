//! cooperative async mutex. Waiters queue FIFO behind a ticket counter so
//! ownership hand-off on drop goes to a specific waiter rather than a
//! coarse "is anyone holding it" flag racing every queued waiter.
use parking_lot::Mutex as SyncMutex;
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

struct Inner<T> {
    owner: Option<u64>,
    next_ticket: u64,
    waiters: VecDeque<(u64, Waker)>,
    value: UnsafeCell<T>,
}

pub struct Mutex<T> {
    inner: Arc<SyncMutex<Inner<T>>>,
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SyncMutex::new(Inner {
                owner: None,
                next_ticket: 0,
                waiters: VecDeque::new(),
                value: UnsafeCell::new(value),
            })),
        }
    }

    pub fn lock(&self) -> Lock<T> {
        Lock {
            inner: self.inner.clone(),
            ticket: None,
        }
    }
}

pub struct Lock<T> {
    inner: Arc<SyncMutex<Inner<T>>>,
    ticket: Option<u64>,
}

impl<T> Future for Lock<T> {
    type Output = MutexGuard<T>;
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut guard = self.inner.lock();
        match self.ticket {
            None => {
                if guard.owner.is_none() {
                    let ticket = guard.next_ticket;
                    guard.next_ticket += 1;
                    guard.owner = Some(ticket);
                    drop(guard);
                    Poll::Ready(MutexGuard {
                        inner: self.inner.clone(),
                    })
                } else {
                    let ticket = guard.next_ticket;
                    guard.next_ticket += 1;
                    guard.waiters.push_back((ticket, cx.waker().clone()));
                    self.ticket = Some(ticket);
                    Poll::Pending
                }
            }
            Some(ticket) => {
                if guard.owner == Some(ticket) {
                    drop(guard);
                    Poll::Ready(MutexGuard {
                        inner: self.inner.clone(),
                    })
                } else {
                    if let Some(entry) = guard.waiters.iter_mut().find(|(t, _)| *t == ticket) {
                        if !entry.1.will_wake(cx.waker()) {
                            entry.1 = cx.waker().clone();
                        }
                    }
                    Poll::Pending
                }
            }
        }
    }
}

pub struct MutexGuard<T> {
    inner: Arc<SyncMutex<Inner<T>>>,
}

impl<T> Deref for MutexGuard<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.inner.lock().value.get() }
    }
}

impl<T> DerefMut for MutexGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.inner.lock().value.get() }
    }
}

impl<T> Drop for MutexGuard<T> {
    fn drop(&mut self) {
        let mut guard = self.inner.lock();
        let next = guard.waiters.pop_front();
        guard.owner = next.as_ref().map(|(ticket, _)| *ticket);
        drop(guard);
        if let Some((_, waker)) = next {
            waker.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;

    #[test]
    fn second_locker_queues_until_drop() {
        let mutex = Mutex::new(0u32);
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut first = Box::pin(mutex.lock());
        let guard = match first.as_mut().poll(&mut cx) {
            Poll::Ready(g) => g,
            Poll::Pending => panic!("expected immediate lock"),
        };

        let mut second = Box::pin(mutex.lock());
        assert!(matches!(second.as_mut().poll(&mut cx), Poll::Pending));

        drop(guard);
        match second.as_mut().poll(&mut cx) {
            Poll::Ready(_) => {}
            Poll::Pending => panic!("expected lock to be granted after drop"),
        }
    }

    #[test]
    fn fifo_order_is_preserved_across_three_waiters() {
        let mutex = Mutex::new(Vec::<u32>::new());
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut first = Box::pin(mutex.lock());
        let g1 = match first.as_mut().poll(&mut cx) {
            Poll::Ready(g) => g,
            Poll::Pending => panic!("expected immediate lock"),
        };

        let mut second = Box::pin(mutex.lock());
        assert!(matches!(second.as_mut().poll(&mut cx), Poll::Pending));
        let mut third = Box::pin(mutex.lock());
        assert!(matches!(third.as_mut().poll(&mut cx), Poll::Pending));

        drop(g1);
        let mut g2 = match second.as_mut().poll(&mut cx) {
            Poll::Ready(g) => g,
            Poll::Pending => panic!("second should now own the lock"),
        };
        g2.push(2);
        assert!(matches!(third.as_mut().poll(&mut cx), Poll::Pending));

        drop(g2);
        let mut g3 = match third.as_mut().poll(&mut cx) {
            Poll::Ready(g) => g,
            Poll::Pending => panic!("third should now own the lock"),
        };
        g3.push(3);
        assert_eq!(*g3, vec![2, 3]);
    }
}
