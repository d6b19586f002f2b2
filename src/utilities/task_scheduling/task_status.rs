//! Completion tracking for tasks submitted to the scheduler.

use crate::utilities::locks;
use crossbeam_utils::CachePadded;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Payload of a panic raised by a scheduled task.
pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// Completion flag shared between a task (or group of tasks) and the threads waiting on it.
///
/// The status starts with a number of pending tasks and reaches "done" when every one of them has notified
/// completion. Clones share the same counter, so the owning task and any number of waiters can each hold a handle.
/// Once done, the status never changes again.
///
/// A task that panics on the scheduler still counts as completed; the first panic of the group is kept so the
/// waiting thread can resume it.
#[derive(Clone, Debug)]
pub struct TaskStatus {
    inner: Arc<StatusState>,
}

#[derive(Debug)]
struct StatusState {
    remaining: CachePadded<AtomicUsize>,
    panic: Mutex<Option<PanicPayload>>,
}

impl Default for TaskStatus {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStatus {
    /// Creates a pending status for a single task.
    #[inline(always)]
    pub fn new() -> Self {
        Self::with_count(1)
    }

    /// Creates a status that is done once `task_count` tasks have completed.
    /// A zero count is done immediately.
    pub fn with_count(task_count: usize) -> Self {
        Self {
            inner: Arc::new(StatusState {
                remaining: CachePadded::new(AtomicUsize::new(task_count)),
                panic: Mutex::new(None),
            }),
        }
    }

    /// Gets whether every task associated with this status has completed.
    #[inline(always)]
    pub fn is_done(&self) -> bool {
        self.inner.remaining.load(Ordering::Acquire) == 0
    }

    /// Gets the number of tasks that have not completed yet.
    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// Notifies the status that one task was completed.
    ///
    /// Returns true if this notification completed the whole group.
    pub fn notify_task_completed(&self) -> bool {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1));
        debug_assert!(
            previous.is_ok(),
            "The counter should not go negative. Was notify called too many times?"
        );
        previous == Ok(1)
    }

    /// Gets whether two handles refer to the same status.
    #[inline(always)]
    pub fn same_as(&self, other: &TaskStatus) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Gets whether a task of this status panicked and the panic has not been taken yet.
    pub fn has_panicked(&self) -> bool {
        locks::lock(&self.inner.panic).is_some()
    }

    /// Keeps `payload` unless an earlier task of the group already panicked.
    pub(crate) fn record_panic(&self, payload: PanicPayload) {
        let mut slot = locks::lock(&self.inner.panic);
        if slot.is_none() {
            *slot = Some(payload);
        }
    }

    /// Takes the stored panic payload, leaving the status without one.
    pub(crate) fn take_panic(&self) -> Option<PanicPayload> {
        locks::lock(&self.inner.panic).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_task_status_completes_once() {
        let status = TaskStatus::new();
        assert!(!status.is_done());
        assert!(status.notify_task_completed());
        assert!(status.is_done());
    }

    #[test]
    fn group_status_completes_on_last_notification() {
        let status = TaskStatus::with_count(3);
        let waiter = status.clone();
        assert!(!status.notify_task_completed());
        assert!(!status.notify_task_completed());
        assert_eq!(waiter.remaining(), 1);
        assert!(status.notify_task_completed());
        assert!(waiter.is_done());
        assert!(waiter.same_as(&status));
    }

    #[test]
    fn first_panic_of_a_group_is_kept() {
        let status = TaskStatus::with_count(2);
        status.record_panic(Box::new("first"));
        status.record_panic(Box::new("second"));
        assert!(status.has_panicked());
        let payload = status.take_panic().and_then(|p| p.downcast::<&str>().ok());
        assert_eq!(payload.as_deref(), Some(&"first"));
        assert!(!status.has_panicked());
    }

    #[test]
    fn empty_group_is_done_immediately() {
        assert!(TaskStatus::with_count(0).is_done());
    }
}
