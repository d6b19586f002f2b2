use std::sync::Arc;

/// Provides multithreading dispatch primitives and a thread count for the simulation to use.
///
/// Note that the simulation does not require a true load balancing for loop implementation. The free-motion stage
/// only fans out one iteration per independent ODE solver, and the number of solvers in a scene is small. All that's
/// needed is a way to run a handful of closures on whatever threads are available and join them.
///
/// This is important when a user wants to share some other thread pool: wrapping it in this trait is enough for
/// the per-solver fan-out to use it.
pub trait IThreadDispatcher: Send + Sync {
    /// Gets the number of threads available to dispatched work, including the calling thread.
    fn thread_count(&self) -> usize;

    /// Invokes `body` once for every index in `0..iteration_count` and returns once all invocations are complete.
    ///
    /// # Arguments
    ///
    /// * `iteration_count` - Number of indices to dispatch.
    /// * `body` - Function invoked with each index. Invocations may run concurrently and in any order.
    fn dispatch_for(&self, iteration_count: usize, body: Arc<dyn Fn(usize) + Send + Sync>);
}
