//! `when_all`: await every task in a set, returning results in input order
//! once all have completed. A joiner future polls each child once per wake,
//! tracking remaining count with a plain counter (single-threaded waker
//! logic; the children themselves may run on other threads).
use super::{JoinError, Task};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Await all of `tasks`, in input order. Mirrors `Task`'s own
/// `Result<T, JoinError>` output per element rather than short-circuiting,
/// so a single panicked child doesn't hide the others' results.
pub async fn join_all<T>(tasks: Vec<Task<T>>) -> Vec<Result<T, JoinError>> {
    JoinAll {
        tasks: tasks.into_iter().map(Some).collect(),
        results: Vec::new(),
    }
    .await
}

struct JoinAll<T> {
    tasks: Vec<Option<Task<T>>>,
    results: Vec<Option<Result<T, JoinError>>>,
}

impl<T> Future for JoinAll<T> {
    type Output = Vec<Result<T, JoinError>>;
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = unsafe { self.get_unchecked_mut() };
        if this.results.is_empty() {
            this.results = this.tasks.iter().map(|_| None).collect();
        }
        let mut all_done = true;
        for (slot, task) in this.results.iter_mut().zip(this.tasks.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            if let Some(t) = task {
                let pinned = unsafe { Pin::new_unchecked(t) };
                match pinned.poll(cx) {
                    Poll::Ready(value) => {
                        *slot = Some(value);
                        *task = None;
                    }
                    Poll::Pending => all_done = false,
                }
            }
        }
        if all_done {
            let results = std::mem::take(&mut this.results);
            Poll::Ready(results.into_iter().map(|r| r.unwrap()).collect())
        } else {
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ThreadPool;

    #[test]
    fn collects_results_in_order() {
        let pool = ThreadPool::new(2).unwrap();
        let tasks = (0..4)
            .map(|i| pool.spawn(async move { i * 10 }))
            .collect::<Vec<_>>();
        let results = crate::task::block_on(join_all(tasks));
        let values: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![0, 10, 20, 30]);
        pool.shutdown();
    }
}
