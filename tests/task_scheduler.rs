//! Scheduler lifecycle, fork/join and waiting behavior under real worker threads.

use proptest::prelude::*;
use rust_freemotion::utilities::task_scheduling::ClosureTask;
use rust_freemotion::utilities::thread_dispatcher::IThreadDispatcher;
use rust_freemotion::{TaskScheduler, TaskStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Polls `status` without helping, so only worker threads can complete it.
fn wait_for_workers(status: &TaskStatus, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while !status.is_done() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    status.is_done()
}

/// Concurrent first initializations create exactly one pool.
#[test]
fn concurrent_initialize_creates_one_pool() {
    let scheduler = Arc::new(TaskScheduler::new());
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                scheduler.initialize(i + 1)
            })
        })
        .collect();
    let created = handles.into_iter().map(|h| h.join().unwrap()).filter(|&c| c).count();
    assert_eq!(created, 1);
    let threads = scheduler.thread_count();
    assert!((1..=8).contains(&threads));
    assert!(!scheduler.initialize(0));
    assert_eq!(scheduler.thread_count(), threads);
}

/// A task fanning out its own work on the same scheduler completes, whichever thread picks it up.
#[test]
fn nested_fork_join_inside_a_task() {
    let scheduler = Arc::new(TaskScheduler::new());
    scheduler.initialize(3);
    let visited = Arc::new((0..64).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());

    let status = TaskStatus::new();
    let inner_scheduler = Arc::clone(&scheduler);
    let inner_visited = Arc::clone(&visited);
    scheduler
        .add_task(ClosureTask::new(
            move || {
                let visited = Arc::clone(&inner_visited);
                inner_scheduler.parallel_for(64, move |i| {
                    visited[i].fetch_add(1, Ordering::Relaxed);
                });
            },
            status.clone(),
        ))
        .unwrap();
    scheduler.work_until_done(&status);

    assert!(status.is_done());
    assert!(visited.iter().all(|v| v.load(Ordering::Relaxed) == 1));
}

/// The waiting thread may do unrelated synchronous work between submitting and waiting.
#[test]
fn wait_after_synchronous_work() {
    let scheduler = TaskScheduler::new();
    scheduler.initialize(2);
    let status = TaskStatus::new();
    let done = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&done);
    scheduler
        .add_task(ClosureTask::new(
            move || {
                thread::sleep(std::time::Duration::from_millis(10));
                flag.store(1, Ordering::Release);
            },
            status.clone(),
        ))
        .unwrap();

    let local: u64 = (0..10_000u64).sum();
    assert_eq!(local, 49_995_000);

    scheduler.work_until_done(&status);
    assert_eq!(done.load(Ordering::Acquire), 1);
    assert_eq!(status.remaining(), 0);
}

/// A group status completes only once every task of the group ran.
#[test]
fn group_status_waits_for_every_task() {
    let scheduler = TaskScheduler::new();
    scheduler.initialize(4);
    let status = TaskStatus::with_count(16);
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..16 {
        let hits = Arc::clone(&hits);
        scheduler
            .add_task(ClosureTask::new(
                move || {
                    hits.fetch_add(1, Ordering::Relaxed);
                },
                status.clone(),
            ))
            .unwrap();
    }
    scheduler.work_until_done(&status);
    assert_eq!(hits.load(Ordering::Relaxed), 16);
}

/// A panic on a worker completes the status, resurfaces on the waiting thread, and leaves the worker serving the pool.
#[test]
fn worker_panic_reaches_the_waiting_thread() {
    let scheduler = TaskScheduler::new();
    scheduler.initialize(2);

    let status = TaskStatus::new();
    scheduler
        .add_task(ClosureTask::new(|| panic!("free motion diverged"), status.clone()))
        .unwrap();
    assert!(wait_for_workers(&status, Duration::from_secs(3)));
    assert!(status.has_panicked());

    let waited = panic::catch_unwind(AssertUnwindSafe(|| scheduler.work_until_done(&status)));
    let message = waited.unwrap_err().downcast::<&str>().map(|m| *m).ok();
    assert_eq!(message, Some("free motion diverged"));
    assert!(!status.has_panicked());

    let next = TaskStatus::new();
    let ran = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&ran);
    scheduler
        .add_task(ClosureTask::new(
            move || {
                flag.store(1, Ordering::Release);
            },
            next.clone(),
        ))
        .unwrap();
    assert!(wait_for_workers(&next, Duration::from_secs(3)));
    assert_eq!(ran.load(Ordering::Acquire), 1);
    assert_eq!(scheduler.thread_count(), 2);
    scheduler.work_until_done(&next);
}

/// A panicking iteration of a parallel loop is resumed by the caller after the other iterations finish.
#[test]
fn parallel_for_resumes_an_iteration_panic() {
    let scheduler = TaskScheduler::new();
    scheduler.initialize(3);
    let visits = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&visits);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        scheduler.parallel_for(16, move |i| {
            sink.fetch_add(1, Ordering::Relaxed);
            if i == 7 {
                panic!("iteration 7");
            }
        })
    }));
    assert!(result.is_err());
    assert_eq!(visits.load(Ordering::Relaxed), 16);
    assert_eq!(scheduler.approximate_task_count(), 0);
}

#[test]
fn dispatcher_trait_object_reports_threads() {
    let scheduler = TaskScheduler::new();
    scheduler.initialize(2);
    let dispatcher: &dyn IThreadDispatcher = &scheduler;
    assert_eq!(dispatcher.thread_count(), 2);
    let sum = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&sum);
    dispatcher.dispatch_for(10, Arc::new(move |i: usize| {
        sink.fetch_add(i, Ordering::Relaxed);
    }));
    assert_eq!(sum.load(Ordering::Relaxed), 45);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every iteration of a parallel loop runs exactly once, for any pool size.
    #[test]
    fn parallel_for_visits_each_index_once(threads in 1usize..6, count in 0usize..200) {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(threads);
        let visits = Arc::new((0..count).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
        let sink = Arc::clone(&visits);
        scheduler.parallel_for(count, move |i| {
            sink[i].fetch_add(1, Ordering::Relaxed);
        });
        prop_assert!(visits.iter().all(|v| v.load(Ordering::Relaxed) == 1));
        prop_assert_eq!(scheduler.approximate_task_count(), 0);
    }
}
