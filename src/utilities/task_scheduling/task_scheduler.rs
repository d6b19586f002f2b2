//! Worker-thread pool shared by every client of the animation loop.

use crate::error::{Result, SimulationError};
use crate::utilities::thread_dispatcher::IThreadDispatcher;
use crossbeam_utils::Backoff;
use std::num::NonZeroUsize;
use std::panic;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::pop_task_result::PopTaskResult;
use super::task::{Job, Task};
use super::task_stack::TaskStack;
use super::task_status::TaskStatus;

/// Lazily-initialized worker-thread pool.
///
/// A scheduler is a process-scoped context object: create one, share it through an `Arc`, and hand it to every
/// animation loop that may run work in parallel. The pool is created by the first call to
/// [`initialize`](TaskScheduler::initialize); later calls only log, so the thread count is fixed for the
/// scheduler's lifetime. Concurrent first calls are race-free and exactly one of them creates the threads.
///
/// The thread count includes the thread that waits on statuses: a scheduler initialized with `N` threads spawns
/// `N - 1` workers, and waiting threads execute queued jobs themselves.
pub struct TaskScheduler {
    pool: OnceLock<WorkerPool>,
}

struct WorkerPool {
    stack: Arc<TaskStack>,
    workers: Vec<JoinHandle<()>>,
    thread_count: usize,
}

impl WorkerPool {
    fn spawn(thread_count: usize) -> Self {
        let stack = Arc::new(TaskStack::new());
        let mut workers = Vec::with_capacity(thread_count.saturating_sub(1));
        for worker_index in 1..thread_count {
            let worker_stack = Arc::clone(&stack);
            let spawned = thread::Builder::new()
                .name(format!("freemotion-worker-{worker_index}"))
                .spawn(move || Self::dispatch_worker_function(worker_index, &worker_stack));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => warn!(?err, worker_index, "failed to spawn scheduler worker"),
            }
        }
        let thread_count = workers.len() + 1;
        Self {
            stack,
            workers,
            thread_count,
        }
    }

    /// Worker function that pops jobs from the stack and executes them until a stop is requested.
    fn dispatch_worker_function(worker_index: usize, stack: &TaskStack) {
        debug!(worker_index, "scheduler worker started");
        loop {
            match stack.try_pop() {
                PopTaskResult::Success(job) => job.run(),
                PopTaskResult::Stop => break,
                PopTaskResult::Empty => stack.wait_for_work(),
            }
        }
        debug!(worker_index, "scheduler worker stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stack.request_stop();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("scheduler worker panicked");
            }
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    /// Creates an uninitialized scheduler. No threads exist until [`initialize`](Self::initialize).
    pub const fn new() -> Self {
        Self {
            pool: OnceLock::new(),
        }
    }

    /// Creates the worker pool with `thread_count` threads, 0 meaning the hardware concurrency.
    ///
    /// Returns true if this call created the pool. Calling it on an initialized scheduler is a no-op that only
    /// logs; the existing threads are kept whatever count is requested.
    pub fn initialize(&self, thread_count: usize) -> bool {
        let mut created = false;
        let pool = self.pool.get_or_init(|| {
            created = true;
            WorkerPool::spawn(Self::resolve_thread_count(thread_count))
        });
        if created {
            info!(
                requested = thread_count,
                threads = pool.thread_count,
                "task scheduler initialized"
            );
        } else {
            info!(
                requested = thread_count,
                threads = pool.thread_count,
                "task scheduler already initialized"
            );
        }
        created
    }

    fn resolve_thread_count(thread_count: usize) -> usize {
        if thread_count > 0 {
            thread_count
        } else {
            thread::available_parallelism().map_or(1, NonZeroUsize::get)
        }
    }

    /// Gets whether the worker pool exists.
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.pool.get().is_some()
    }

    /// Gets the number of threads taking part in scheduled work, or 0 while uninitialized.
    #[inline(always)]
    pub fn thread_count(&self) -> usize {
        self.pool.get().map_or(0, |pool| pool.thread_count)
    }

    /// Gets the approximate number of jobs waiting for a thread.
    pub fn approximate_task_count(&self) -> usize {
        self.pool.get().map_or(0, |pool| pool.stack.approximate_task_count())
    }

    /// Enqueues a task for asynchronous execution and returns immediately.
    ///
    /// The task is consumed, so it runs at most once, on exactly one thread. Its status is notified after `run`
    /// returns.
    pub fn add_task<T: Task + 'static>(&self, task: T) -> Result<()> {
        let pool = self.pool.get().ok_or(SimulationError::SchedulerNotInitialized)?;
        pool.stack.push(Job::from_task(task));
        Ok(())
    }

    /// Blocks the calling thread until `status` is done, executing queued jobs while it waits.
    ///
    /// Safe to call from worker threads (nested fork/join) and from a thread that did synchronous work between
    /// submitting and waiting. There is no timeout: a job that never finishes stalls the caller.
    ///
    /// If a job of `status` panicked, the panic is resumed on the calling thread once the status is done. The
    /// thread that ran the job keeps serving the pool.
    pub fn work_until_done(&self, status: &TaskStatus) {
        let backoff = Backoff::new();
        while !status.is_done() {
            let popped = self.pool.get().map(|pool| pool.stack.try_pop());
            match popped {
                Some(PopTaskResult::Success(job)) => {
                    job.run();
                    backoff.reset();
                }
                _ => {
                    if backoff.is_completed() {
                        thread::yield_now();
                    } else {
                        backoff.snooze();
                    }
                }
            }
        }
        if let Some(payload) = status.take_panic() {
            panic::resume_unwind(payload);
        }
    }

    /// Runs `body(i)` for every `i` in `0..iteration_count` and returns when all iterations are complete.
    ///
    /// The calling thread executes iteration 0 directly and then helps with the rest. Without a pool every
    /// iteration runs inline, in order.
    pub fn parallel_for<F>(&self, iteration_count: usize, body: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.dispatch_for(iteration_count, Arc::new(body));
    }
}

impl IThreadDispatcher for TaskScheduler {
    fn thread_count(&self) -> usize {
        TaskScheduler::thread_count(self)
    }

    fn dispatch_for(&self, iteration_count: usize, body: Arc<dyn Fn(usize) + Send + Sync>) {
        let Some(pool) = self.pool.get() else {
            (0..iteration_count).for_each(|i| body(i));
            return;
        };
        if iteration_count <= 1 {
            (0..iteration_count).for_each(|i| body(i));
            return;
        }

        // Only iterations beyond the first go to the stack; the current thread is responsible for iteration 0.
        let status = TaskStatus::with_count(iteration_count - 1);
        let jobs = (1..iteration_count)
            .map(|i| {
                let body = Arc::clone(&body);
                Job::new(move || body(i), status.clone())
            })
            .collect();
        pool.stack.push_many(jobs);

        body(0);
        self.work_until_done(&status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::task_scheduling::ClosureTask;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn uninitialized_scheduler_rejects_tasks() {
        let scheduler = TaskScheduler::new();
        assert_eq!(scheduler.thread_count(), 0);
        let result = scheduler.add_task(ClosureTask::new(|| {}, TaskStatus::new()));
        assert_eq!(result, Err(SimulationError::SchedulerNotInitialized));
    }

    #[test]
    fn second_initialize_keeps_thread_count() {
        let scheduler = TaskScheduler::new();
        assert!(scheduler.initialize(3));
        assert_eq!(scheduler.thread_count(), 3);
        assert!(!scheduler.initialize(8));
        assert_eq!(scheduler.thread_count(), 3);
    }

    #[test]
    fn auto_thread_count_is_positive() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(0);
        assert!(scheduler.thread_count() >= 1);
    }

    #[test]
    fn single_thread_scheduler_runs_tasks_while_waiting() {
        let scheduler = TaskScheduler::new();
        scheduler.initialize(1);
        let status = TaskStatus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        scheduler
            .add_task(ClosureTask::new(
                move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                },
                status.clone(),
            ))
            .unwrap();
        scheduler.work_until_done(&status);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn parallel_for_without_pool_runs_in_order() {
        let scheduler = TaskScheduler::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        scheduler.parallel_for(4, move |i| sink.lock().unwrap().push(i));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }
}
