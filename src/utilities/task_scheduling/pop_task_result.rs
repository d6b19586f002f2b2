//! Outcome of a pop attempt on the task stack.

use super::task::Job;

/// Describes the result of a pop attempt.
pub(crate) enum PopTaskResult {
    /// A job was popped; the caller now owns it and must run it.
    Success(Job),
    /// The stack was empty, but may have more jobs in the future.
    Empty,
    /// The stack has been stopped and drained; threads seeking work should exit.
    Stop,
}

impl PopTaskResult {
    #[cfg(test)]
    pub(crate) fn is_success(&self) -> bool {
        matches!(self, PopTaskResult::Success(_))
    }
}
