//! `sync_wait`: block the current OS thread until `future` resolves, using
//! a thread park/unpark waker, matching the teacher's pattern of a private
//! binary latch guarding a one-shot result slot (`work::Oneshot`).
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }
    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// Drive `future` to completion on the calling thread, parking between
/// polls instead of busy-spinning.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let mut future = pin!(future);
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => thread::park(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ready_future_without_parking() {
        assert_eq!(block_on(async { 1 + 1 }), 2);
    }

    #[test]
    fn resolves_after_other_thread_wakes() {
        use crate::sync::Latch;
        let latch = Latch::new();
        let waiting = latch.clone();
        let handle = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(20));
            waiting.count_down();
        });
        block_on(latch.wait());
        handle.join().unwrap();
    }
}
