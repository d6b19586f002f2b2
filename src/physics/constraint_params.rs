use crate::physics::vec_id::VecId;

/// Which quantities the constraint solver corrects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintOrder {
    /// Only velocities are corrected; positions are integrated from the corrected velocities afterwards.
    VelocityOnly,
    /// Positions and velocities are both corrected by the solver.
    PositionAndVelocity,
}

/// Parameters shared by every stage of one step that deals with constraints. Built once per step and never
/// modified afterwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstraintParams {
    x: VecId,
    v: VecId,
    dx: VecId,
    lambda: VecId,
    order: ConstraintOrder,
    dt: f64,
}

impl ConstraintParams {
    /// # Arguments
    ///
    /// * `x` - Free (unconstrained) positions.
    /// * `v` - Free velocities.
    /// * `dx` - Correction vector written by the solver.
    /// * `lambda` - Constraint multipliers.
    /// * `order` - Quantities the solver corrects.
    /// * `dt` - Duration of the step.
    pub fn new(x: VecId, v: VecId, dx: VecId, lambda: VecId, order: ConstraintOrder, dt: f64) -> Self {
        Self {
            x,
            v,
            dx,
            lambda,
            order,
            dt,
        }
    }

    #[inline(always)]
    pub fn x(&self) -> VecId {
        self.x
    }

    #[inline(always)]
    pub fn v(&self) -> VecId {
        self.v
    }

    #[inline(always)]
    pub fn dx(&self) -> VecId {
        self.dx
    }

    #[inline(always)]
    pub fn lambda(&self) -> VecId {
        self.lambda
    }

    #[inline(always)]
    pub fn order(&self) -> ConstraintOrder {
        self.order
    }

    #[inline(always)]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Returns true if the solver corrects positions as well as velocities.
    pub fn corrects_positions(&self) -> bool {
        self.order == ConstraintOrder::PositionAndVelocity
    }
}
