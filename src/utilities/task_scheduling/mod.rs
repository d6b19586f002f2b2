//! Task scheduling system for the parallel parts of a simulation step.
//!
//! This module provides a small work-sharing task scheduler. It includes:
//!
//! - `TaskScheduler`: the worker-thread pool, initialized once and shared by every client
//! - `Task`: a unit of work with a `run` contract
//! - `TaskStatus`: the completion flag waiters block on
//! - `TaskStack`: the job queue the workers pull from

mod pop_task_result;
mod task;
mod task_scheduler;
mod task_stack;
mod task_status;

// Re-export public API
pub use task::{ClosureTask, Task};
pub use task_scheduler::TaskScheduler;
pub use task_status::TaskStatus;
