use crate::physics::constraint_params::ConstraintOrder;

/// Switches of the free-motion animation loop.
///
/// The switches are fixed when the loop is created: configure prepares storage and the scheduler for them, and
/// every step reads the same values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct FreeMotionLoopConfig {
    /// Solve constraints on velocities only, then integrate positions from the corrected velocities.
    pub solve_velocity_constraint_first: bool,
    /// Allocate fresh correction and force storage every step instead of zeroing it in place.
    pub thread_safe_visitor: bool,
    /// Run free motion on a worker while collision detection runs on the stepping thread.
    pub parallel_collision_detection_and_free_motion: bool,
    /// Integrate independent ODE solver subtrees concurrently.
    pub parallel_ode_solving: bool,
    /// Recompute scene bounding boxes at the end of every step.
    pub update_bounding_boxes: bool,
    /// Threads used by the task scheduler when a parallel switch is set. 0 uses the hardware concurrency.
    pub thread_count: usize,
}

impl Default for FreeMotionLoopConfig {
    fn default() -> Self {
        Self {
            solve_velocity_constraint_first: false,
            thread_safe_visitor: false,
            parallel_collision_detection_and_free_motion: false,
            parallel_ode_solving: false,
            update_bounding_boxes: true,
            thread_count: 0,
        }
    }
}

impl FreeMotionLoopConfig {
    pub fn with_solve_velocity_constraint_first(mut self, enabled: bool) -> Self {
        self.solve_velocity_constraint_first = enabled;
        self
    }

    pub fn with_thread_safe_visitor(mut self, enabled: bool) -> Self {
        self.thread_safe_visitor = enabled;
        self
    }

    pub fn with_parallel_collision_detection_and_free_motion(mut self, enabled: bool) -> Self {
        self.parallel_collision_detection_and_free_motion = enabled;
        self
    }

    pub fn with_parallel_ode_solving(mut self, enabled: bool) -> Self {
        self.parallel_ode_solving = enabled;
        self
    }

    pub fn with_update_bounding_boxes(mut self, enabled: bool) -> Self {
        self.update_bounding_boxes = enabled;
        self
    }

    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Constraint order selected by `solve_velocity_constraint_first`.
    pub fn constraint_order(&self) -> ConstraintOrder {
        if self.solve_velocity_constraint_first {
            ConstraintOrder::VelocityOnly
        } else {
            ConstraintOrder::PositionAndVelocity
        }
    }

    /// Returns true if any switch needs the task scheduler.
    pub fn uses_scheduler(&self) -> bool {
        self.parallel_collision_detection_and_free_motion || self.parallel_ode_solving
    }
}
