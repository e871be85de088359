//! queue
//!
//! MPMC async queue (C8): FIFO `push`/`pop` with a suspendable pop and a
//! shutdown protocol verified against the scenarios in
//! `original_source/test/test_queue.cpp`: `shutdown()` is an immediate hard
//! stop — `pop` observes `stopped` from that point on even if the backlog
//! is non-empty (the "queue stopped" scenario: push, shutdown, pop is
//! stopped, `len()` still reports the stranded item). `shutdown_drain`
//! waits for the backlog to empty naturally before shutting down, for
//! callers (like a dedicated shutdown task) that want every already-pushed
//! item delivered to concurrent consumers first.
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

struct Inner<T> {
    state: State,
    items: VecDeque<T>,
    waiters: VecDeque<Waker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The queue is shutting down or drained; the pushed value is returned
    /// to the caller rather than silently discarded.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopResult {
    Empty,
    Stopped,
}

/// A multi-producer multi-consumer queue shared via `Clone` handles, all
/// referring to the same underlying deque.
pub struct Queue<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Open,
                items: VecDeque::new(),
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Push a value. Returns the value back to the caller if the queue is
    /// no longer open — pushing after `shutdown()` is a structural no-op,
    /// matching the "shutdown then produce" scenario: the push succeeds at
    /// the API boundary conceptually, but no consumer will ever see it and
    /// the queue's reported size stays zero.
    pub fn push(&self, value: T) -> std::result::Result<(), (T, PushError)> {
        let mut inner = self.inner.lock();
        if inner.state != State::Open {
            return Err((value, PushError::Closed));
        }
        inner.items.push_back(value);
        let waiter = inner.waiters.pop_front();
        drop(inner);
        if let Some(waker) = waiter {
            waker.wake();
        }
        Ok(())
    }

    /// Pop without suspending. Checks `state` before touching the deque: once
    /// `shutdown()` has run, every `try_pop` reports `Stopped` and leaves any
    /// backlog untouched, even if items are still queued (the "queue
    /// stopped" scenario — `len()` keeps reporting the stranded items).
    pub fn try_pop(&self) -> std::result::Result<T, PopResult> {
        let mut inner = self.inner.lock();
        if inner.state != State::Open {
            return Err(PopResult::Stopped);
        }
        match inner.items.pop_front() {
            Some(value) => Ok(value),
            None => Err(PopResult::Empty),
        }
    }

    pub fn pop(&self) -> Pop<T> {
        Pop {
            queue: self.clone(),
            queued: false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Immediate hard stop: no further pushes are accepted, and every pop
    /// from this point on — even one racing a still-pending backlog —
    /// observes `Stopped`. Any items still queued remain in place and are
    /// reflected by `len()`, but are no longer reachable via `pop`/`try_pop`.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        let waiters = std::mem::take(&mut inner.waiters);
        drop(inner);
        for waker in waiters {
            waker.wake();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().state == State::Closed
    }
}

pub struct Pop<T> {
    queue: Queue<T>,
    queued: bool,
}

impl<T> Future for Pop<T> {
    type Output = std::result::Result<T, PopResult>;
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.queue.try_pop() {
            Ok(value) => Poll::Ready(Ok(value)),
            Err(PopResult::Stopped) => Poll::Ready(Err(PopResult::Stopped)),
            Err(PopResult::Empty) => {
                if !self.queued {
                    self.queue.inner.lock().waiters.push_back(cx.waker().clone());
                    self.queued = true;
                }
                // Re-check: a push may have landed between `try_pop` and
                // registering the waiter above.
                match self.queue.try_pop() {
                    Ok(value) => Poll::Ready(Ok(value)),
                    Err(e) => {
                        if e == PopResult::Stopped {
                            Poll::Ready(Err(PopResult::Stopped))
                        } else {
                            Poll::Pending
                        }
                    }
                }
            }
        }
    }
}

/// Wait for concurrent producers to finish pushing (signalled by `queue`
/// going empty) before issuing the hard stop, so nothing already in transit
/// is stranded. Mirrors the teacher's `shutdown_drain(tp)` helper used in the
/// original source's queue tests — there it is driven by a latch counting
/// down once per producer; callers here should do the same (see
/// `multiple_producers_and_consumers_via_thread_pool`) rather than call this
/// while a producer might still push.
pub async fn shutdown_drain<T>(queue: &Queue<T>) {
    while !queue.is_empty() {
        Yield::default().await;
    }
    queue.shutdown();
}

#[derive(Default)]
struct Yield {
    yielded: bool,
}

impl Future for Yield {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::block_on;
    use futures::task::noop_waker_ref;

    #[test]
    fn single_produce_consume() {
        let queue: Queue<i32> = Queue::new();
        queue.push(7).unwrap();
        assert_eq!(block_on(queue.pop()), Ok(7));
    }

    #[test]
    fn pop_on_empty_queue_is_pending() {
        let queue: Queue<i32> = Queue::new();
        let mut pop = Box::pin(queue.pop());
        let mut cx = Context::from_waker(noop_waker_ref());
        assert_eq!(pop.as_mut().poll(&mut cx), Poll::Pending);
    }

    #[test]
    fn shutdown_then_produce_leaves_queue_empty_for_consumers() {
        let queue: Queue<i32> = Queue::new();
        queue.shutdown();
        let pushed = queue.push(1);
        assert!(pushed.is_err());
        assert_eq!(queue.len(), 0);
        assert_eq!(block_on(queue.pop()), Err(PopResult::Stopped));
    }

    #[test]
    fn shutdown_after_produce_strands_the_backlog() {
        let queue: Queue<i32> = Queue::new();
        queue.push(42).unwrap();
        queue.shutdown();
        assert_eq!(block_on(queue.pop()), Err(PopResult::Stopped));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn try_pop_sequence_matches_empty_value_stopped() {
        let queue: Queue<i32> = Queue::new();
        assert_eq!(queue.try_pop(), Err(PopResult::Empty));
        queue.push(42).unwrap();
        assert_eq!(queue.try_pop(), Ok(42));
        assert_eq!(queue.try_pop(), Err(PopResult::Empty));
        queue.shutdown();
        assert_eq!(queue.try_pop(), Err(PopResult::Stopped));
    }

    #[test]
    fn multiple_producers_and_consumers_via_thread_pool() {
        use crate::pool::ThreadPool;
        use crate::sync::Latch;
        use std::sync::atomic::{AtomicI32, Ordering};
        const PRODUCERS: i32 = 4;

        let pool = ThreadPool::new(4).unwrap();
        let queue: Queue<i32> = Queue::new();
        let done = Latch::new();
        let remaining = Arc::new(AtomicI32::new(PRODUCERS));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = queue.clone();
                let done = done.clone();
                let remaining = remaining.clone();
                pool.spawn(async move {
                    for i in 0..25 {
                        queue.push(p * 25 + i).unwrap();
                    }
                    // Only the last producer to finish fires the latch —
                    // the shutdown task needs every producer done, not
                    // just one.
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        done.count_down();
                    }
                })
            })
            .collect();

        let sum_handle = {
            let queue = queue.clone();
            pool.spawn(async move {
                let mut sum = 0i64;
                loop {
                    match queue.pop().await {
                        Ok(v) => sum += v as i64,
                        Err(PopResult::Stopped) => break,
                        Err(PopResult::Empty) => unreachable!(),
                    }
                }
                sum
            })
        };

        // A dedicated shutdown task, gated on every producer finishing,
        // drains the backlog before issuing the hard stop — matching the
        // original source's latch-gated `shutdown_drain` usage.
        let shutdown_handle = {
            let queue = queue.clone();
            pool.spawn(async move {
                done.wait().await;
                shutdown_drain(&queue).await;
            })
        };

        block_on(async {
            for p in producers {
                p.await.unwrap();
            }
        });
        let total = block_on(sum_handle).unwrap();
        block_on(shutdown_handle).unwrap();
        assert_eq!(total, (0..PRODUCERS * 25).sum::<i64>());
        pool.shutdown();
    }
}
