//! task
//!
//! Task/continuation (C1). `Future::poll` already realizes the is-ready /
//! attach-continuation / produce-value awaiter contract, so this module
//! delegates the mechanics to `async-task` (the same crate
//! `compio-runtime` uses for its `Runnable`/`Task`) rather than hand-rolling
//! coroutine-frame plumbing, and adds `block_on` (`sync_wait`) and
//! `join_all` (`when_all`) on top.
mod block_on;
mod join;

pub use block_on::block_on;
pub use join::join_all;

use async_task::Runnable;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub type Task<T> = async_task::Task<Result<T, JoinError>>;

/// A panic caught across a task boundary instead of propagating and
/// tearing down the worker thread that happened to be running it.
#[derive(Debug)]
pub enum JoinError {
    Panicked(Box<dyn Any + Send + 'static>),
    Cancelled,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Panicked(_) => write!(f, "task panicked"),
            JoinError::Cancelled => write!(f, "task cancelled"),
        }
    }
}

impl std::error::Error for JoinError {}

/// Wrap `future` so a panic inside it becomes a `JoinError` instead of
/// unwinding through the scheduler.
pub(crate) fn catch_panics<F>(
    future: F,
) -> impl Future<Output = Result<F::Output, JoinError>>
where
    F: Future,
{
    async move {
        let mut future = Box::pin(future);
        std::future::poll_fn(move |cx| {
            catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(cx)))
                .unwrap_or_else(|payload| std::task::Poll::Ready(Err(JoinError::Panicked(payload))))
                .map(Ok)
        })
        .await
    }
}

/// Spawn `future` onto `schedule`, the same low-level hook the thread pool
/// and `block_on` use to turn a `Runnable` into "resume later". Returns the
/// `Task` handle; dropping it detaches rather than cancels, matching
/// `async-task`'s default.
pub fn spawn_with<F>(future: F, schedule: impl Fn(Runnable) + Send + Sync + 'static) -> Task<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let (runnable, task) = async_task::spawn(catch_panics(future), schedule);
    runnable.schedule();
    task
}

/// Run a blocking closure off the pool's fixed worker set, on a dedicated
/// one-shot OS thread, so it can't stall I/O dispatch on a pool worker.
/// Resolves a `Task` when the closure returns.
pub fn spawn_blocking<F, T>(f: F) -> Task<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    spawn_with(async move { f() }, |runnable| {
        std::thread::spawn(move || runnable.run());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_blocking_runs_off_the_calling_thread_and_resolves() {
        let here = std::thread::current().id();
        let task = spawn_blocking(move || (std::thread::current().id(), 7));
        let (ran_on, value) = block_on(task).unwrap();
        assert_eq!(value, 7);
        assert_ne!(ran_on, here);
    }
}
