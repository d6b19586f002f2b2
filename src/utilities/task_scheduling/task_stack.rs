//! Shared job stack feeding the scheduler's worker threads.

use crate::utilities::locks;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use super::pop_task_result::PopTaskResult;
use super::task::Job;

/// Manages a stack of jobs for parallel execution.
///
/// The most recently pushed job is popped first, which keeps fork/join fan-outs close to the thread that issued
/// them. Idle workers block on a condition variable instead of spinning; threads waiting on a status pop
/// opportunistically and never block here.
pub(crate) struct TaskStack {
    jobs: Mutex<Vec<Job>>,
    work_available: Condvar,
    /// Stop flag - when true, workers stop after exhausting work.
    stop: CachePadded<AtomicBool>,
}

impl TaskStack {
    pub(crate) fn new() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            work_available: Condvar::new(),
            stop: CachePadded::new(AtomicBool::new(false)),
        }
    }

    /// Gets the approximate number of queued jobs.
    /// Not guaranteed to measure the true number at any point in time.
    pub(crate) fn approximate_task_count(&self) -> usize {
        locks::lock(&self.jobs).len()
    }

    /// Pushes a single job and wakes one idle worker.
    pub(crate) fn push(&self, job: Job) {
        locks::lock(&self.jobs).push(job);
        self.work_available.notify_one();
    }

    /// Pushes a set of jobs and wakes every idle worker.
    pub(crate) fn push_many(&self, jobs: Vec<Job>) {
        if jobs.is_empty() {
            return;
        }
        locks::lock(&self.jobs).extend(jobs);
        self.work_available.notify_all();
    }

    /// Attempts to pop a job from the stack.
    ///
    /// Queued work is still handed out after a stop request; `Stop` is only reported once the stack is drained.
    pub(crate) fn try_pop(&self) -> PopTaskResult {
        if let Some(job) = locks::lock(&self.jobs).pop() {
            return PopTaskResult::Success(job);
        }
        if self.stop.load(Ordering::Acquire) {
            PopTaskResult::Stop
        } else {
            PopTaskResult::Empty
        }
    }

    /// Blocks the calling worker until a job is pushed or a stop is requested.
    pub(crate) fn wait_for_work(&self) {
        let mut jobs = locks::lock(&self.jobs);
        while jobs.is_empty() && !self.stop.load(Ordering::Acquire) {
            jobs = self
                .work_available
                .wait(jobs)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Requests that all workers stop.
    /// The next time a worker runs out of jobs, if it sees a stop command, it will stop.
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        // Taking the lock orders the store before any worker's emptiness check.
        drop(locks::lock(&self.jobs));
        self.work_available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::task_scheduling::TaskStatus;

    #[test]
    fn pops_most_recent_job_first() {
        let stack = TaskStack::new();
        let first = TaskStatus::new();
        let second = TaskStatus::new();
        stack.push(Job::new(|| {}, first.clone()));
        stack.push(Job::new(|| {}, second.clone()));
        assert_eq!(stack.approximate_task_count(), 2);

        match stack.try_pop() {
            PopTaskResult::Success(job) => job.run(),
            _ => panic!("expected a job"),
        }
        assert!(second.is_done());
        assert!(!first.is_done());
    }

    #[test]
    fn stop_is_reported_only_once_drained() {
        let stack = TaskStack::new();
        stack.push(Job::new(|| {}, TaskStatus::new()));
        stack.request_stop();
        assert!(stack.try_pop().is_success());
        assert!(matches!(stack.try_pop(), PopTaskResult::Stop));
        // Must return immediately once stopped.
        stack.wait_for_work();
    }

    #[test]
    fn empty_stack_reports_empty() {
        assert!(matches!(TaskStack::new().try_pop(), PopTaskResult::Empty));
    }
}
