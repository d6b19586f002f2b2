//! Error type shared by the animation loop, the scheduler and the built-in collaborators.

use crate::physics::vec_id::VecId;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Failures the animation loop reports instead of silently skipping a stage.
///
/// None of these are recoverable mid-step: a step that returns an error has stopped at the failing sub-phase and
/// the scene should be considered inconsistent until the configuration is fixed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    /// `step` was called before `configure`.
    #[error("animation loop stepped before configure()")]
    NotConfigured,
    /// No constraint solver exists in the scene and no default solver was available to install.
    #[error("no constraint solver found in the scene and no default solver available")]
    NoConstraintSolver,
    /// A parallel switch is set but the task scheduler was never initialized.
    #[error("task scheduler used before initialization")]
    SchedulerNotInitialized,
    /// The requested (or substituted default) time step cannot be integrated.
    #[error("invalid time step: {0}")]
    InvalidTimestep(f64),
    /// A vector written into a mechanical state does not match its degree-of-freedom count.
    #[error("vector {id:?} of state `{state}` has {actual} entries, expected {expected}")]
    VectorSizeMismatch {
        /// Name of the mechanical state.
        state: String,
        /// Role of the vector being written.
        id: VecId,
        /// Degree-of-freedom count of the state.
        expected: usize,
        /// Length of the rejected vector.
        actual: usize,
    },
}
