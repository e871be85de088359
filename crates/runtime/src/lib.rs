//! coro-runtime
//!
//! A suspendable task runtime: tasks driven by `Future::poll`, a pluggable
//! I/O notifier behind one readiness-family and one completion-family
//! backend, the I/O scheduler that owns it, a fixed-worker thread pool, an
//! async MPMC queue, cooperative sync primitives, a cross-platform signal,
//! and the length-prefixed packet codec used at the edge between peers.
pub mod codec;
pub mod error;
pub mod pool;
pub mod poll;
pub mod queue;
pub mod signal;
pub mod sync;
pub mod task;
pub mod timer;

pub use error::{Error, Result};
pub use pool::ThreadPool;
pub use poll::Scheduler;
pub use queue::Queue;
pub use task::{block_on, join_all, spawn_blocking, JoinError, Task};
pub use timer::TimerHandle;
