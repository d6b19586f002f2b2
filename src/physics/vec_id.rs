/// Logical role of a vector stored in every mechanical state.
///
/// The animation loop never owns vector storage; it addresses vectors by role and lets each mechanical state map
/// the role to its own buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VecId {
    /// Current position.
    Position,
    /// Current velocity.
    Velocity,
    /// Internal force accumulator used by ODE solvers.
    Force,
    /// Force applied from outside the simulation (e.g. user interaction), cleared at the end of each integration.
    ExternalForce,
    /// Position reached by unconstrained motion during the current step.
    FreePosition,
    /// Velocity reached by unconstrained motion during the current step.
    FreeVelocity,
    /// Integration correction.
    Dx,
    /// Force correction.
    DForce,
    /// Correction computed by the constraint solver.
    ConstraintDx,
    /// Lagrange multipliers of the constraint solver.
    Lambda,
}

