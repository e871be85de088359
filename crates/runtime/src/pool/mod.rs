//! pool
//!
//! Thread pool (C7): a fixed set of worker threads draining a channel of
//! `async_task::Runnable`s, generalizing the teacher's `work::WorkOncePool`
//! (a fixed Win32 threadpool callback environment) from one-shot Win32 work
//! items to a portable `schedule()`/`yield()` task executor.
use crate::error::{Error, Result};
use crate::task::{self, Task};
use async_task::Runnable;
use crossbeam::channel::{self, Receiver, Sender};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle as OsJoinHandle;

enum Message {
    Run(Runnable),
    Shutdown,
}

struct Shared {
    sender: Sender<Message>,
    shutting_down: AtomicBool,
    worker_count: usize,
}

/// A fixed-size pool of worker threads that run scheduled futures to
/// completion, resuming each `Runnable` as it's pushed to the ready queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: parking_lot::Mutex<Vec<OsJoinHandle<()>>>,
}

impl ThreadPool {
    pub fn new(workers: usize) -> Result<Arc<Self>> {
        assert!(workers > 0, "a thread pool needs at least one worker");
        let (sender, receiver) = channel::unbounded();
        let shared = Arc::new(Shared {
            sender,
            shutting_down: AtomicBool::new(false),
            worker_count: workers,
        });
        let handles = (0..workers)
            .map(|id| spawn_worker(id, receiver.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Io)?;
        Ok(Arc::new(Self {
            shared,
            workers: parking_lot::Mutex::new(handles),
        }))
    }

    /// Spawn `future`, returning a `Task` handle for its result.
    pub fn spawn<F>(&self, future: F) -> Task<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let sender = self.shared.sender.clone();
        task::spawn_with(future, move |runnable| {
            // A send error means every worker has already exited (pool
            // shutting down); the runnable is simply dropped.
            let _ = sender.send(Message::Run(runnable));
        })
    }

    /// Run a plain closure on the pool, without tracking its result as a
    /// `Task` (used by the scheduler's `schedule_after`).
    pub fn execute<F: FnOnce() + Send + 'static>(&self, f: F) {
        let task = self.spawn(async move { f() });
        task.detach();
    }

    /// Begin shutdown: stop accepting new runnables, let every in-flight
    /// one finish, then join every worker thread. One `Message::Shutdown`
    /// per worker guarantees each recv loop observes its own exit signal
    /// even while other senders (in-flight `spawn` closures) are still
    /// alive, matching the queue's own `shutdown_drain` protocol.
    pub fn shutdown(&self) {
        if self.shared.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for _ in 0..self.shared.worker_count {
            let _ = self.shared.sender.send(Message::Shutdown);
        }
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker(id: usize, receiver: Receiver<Message>) -> std::io::Result<OsJoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("coro-worker-{id}"))
        .spawn(move || loop {
            match receiver.recv() {
                Ok(Message::Run(runnable)) => {
                    tracing::debug!(worker = id, "resuming runnable");
                    runnable.run();
                }
                Ok(Message::Shutdown) | Err(_) => break,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_spawned_futures() {
        let pool = ThreadPool::new(2).unwrap();
        let task = pool.spawn(async { 21 + 21 });
        assert_eq!(task::block_on(task).unwrap(), 42);
        pool.shutdown();
    }

    #[test]
    fn shutdown_joins_workers_without_deadlock() {
        let pool = ThreadPool::new(2).unwrap();
        let task = pool.spawn(async { 1 });
        let _ = task::block_on(task);
        pool.shutdown();
    }
}
