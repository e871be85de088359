//! scheduler
use coro_runtime::{poll::Scheduler, task::block_on};
use std::time::{Duration, Instant};

#[test]
fn sleep_resolves_after_its_duration_elapses() {
    let scheduler = Scheduler::new().unwrap();
    let start = Instant::now();
    block_on(scheduler.sleep(Duration::from_millis(30)));
    assert!(start.elapsed() >= Duration::from_millis(25));
}

#[test]
fn sleep_until_a_past_instant_resolves_immediately() {
    let scheduler = Scheduler::new().unwrap();
    let start = Instant::now();
    block_on(scheduler.sleep_until(Instant::now() - Duration::from_secs(1)));
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn yield_now_gives_up_the_worker_exactly_once() {
    let scheduler = Scheduler::new().unwrap();
    block_on(async {
        scheduler.yield_now().await;
        scheduler.yield_now().await;
    });
}
