//! Task definition for the task scheduling system.
//!
//! Tasks represent units of work that can be executed synchronously by their owner or by worker threads.

use super::task_status::TaskStatus;
use std::panic::{self, AssertUnwindSafe};

/// A unit of schedulable work.
///
/// `run` returns nothing: a task communicates results by writing into shared state (mechanical-state vectors, for
/// the tasks in this crate). When a task is submitted to a [`TaskScheduler`](super::TaskScheduler) the scheduler
/// notifies [`Task::status`] after `run` returns; when the owner calls `run` directly the status is untouched.
pub trait Task: Send {
    /// Executes the work of the task.
    fn run(&mut self);

    /// Status notified once the task completes on the scheduler.
    fn status(&self) -> &TaskStatus;
}

/// Task wrapping a closure, for work that doesn't warrant its own type.
pub struct ClosureTask<F: FnOnce() + Send> {
    body: Option<F>,
    status: TaskStatus,
}

impl<F: FnOnce() + Send> ClosureTask<F> {
    /// Creates a task running `body` once, notifying `status` when scheduled.
    pub fn new(body: F, status: TaskStatus) -> Self {
        Self {
            body: Some(body),
            status,
        }
    }
}

impl<F: FnOnce() + Send> Task for ClosureTask<F> {
    fn run(&mut self) {
        if let Some(body) = self.body.take() {
            body();
        }
    }

    fn status(&self) -> &TaskStatus {
        &self.status
    }
}

/// Type-erased job held by the task stack: the work plus the status to notify after it.
pub(crate) struct Job {
    body: Box<dyn FnOnce() + Send>,
    status: TaskStatus,
}

impl Job {
    /// Creates a job from a closure notifying `status` on completion.
    pub(crate) fn new<F>(body: F, status: TaskStatus) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            body: Box::new(body),
            status,
        }
    }

    /// Wraps a task, consuming it so it can be scheduled at most once.
    pub(crate) fn from_task<T: Task + 'static>(mut task: T) -> Self {
        let status = task.status().clone();
        Self::new(move || task.run(), status)
    }

    /// Runs the job and notifies its status, even if the body panics.
    ///
    /// A panic is stored in the status instead of unwinding through the thread that happened to pop the job.
    #[inline(always)]
    pub(crate) fn run(self) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(self.body)) {
            self.status.record_panic(payload);
        }
        self.status.notify_task_completed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn direct_run_leaves_status_pending() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut task = ClosureTask::new(
            move || {
                counter.fetch_add(1, Ordering::Relaxed);
            },
            TaskStatus::new(),
        );
        task.run();
        task.run();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert!(!task.status().is_done());
    }

    #[test]
    fn job_notifies_status_after_running() {
        let status = TaskStatus::new();
        let job = Job::from_task(ClosureTask::new(|| {}, status.clone()));
        job.run();
        assert!(status.is_done());
    }

    #[test]
    fn panicking_job_still_completes_its_status() {
        let status = TaskStatus::new();
        let job = Job::from_task(ClosureTask::new(|| panic!("integration failed"), status.clone()));
        job.run();
        assert!(status.is_done());
        assert!(status.has_panicked());
    }
}
