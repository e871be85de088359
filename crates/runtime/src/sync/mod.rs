//! sync
//!
//! Awaitable primitives (C2) built on the same waker-juggling idiom the
//! teacher uses in `futures::watch::Watch`/`Signal`: a `parking_lot::Mutex`
//! guarding an `Option<Waker>` (or a queue of them), with `will_wake` used
//! to avoid cloning a waker that is already registered.
mod barrier;
mod latch;
mod mutex;

pub use barrier::Barrier;
pub use latch::Latch;
pub use mutex::{Mutex, MutexGuard};
