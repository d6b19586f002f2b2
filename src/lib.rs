//! Free-motion animation loop for constrained mechanical scenes.
//!
//! Every step integrates the unconstrained ("free") motion of the scene, detects collisions, and solves the
//! resulting constraints starting from the free motion. Free motion and collision detection can overlap on a
//! [`TaskScheduler`]; both strategies produce the same state.

pub mod config;
pub mod error;
pub mod physics;
pub mod utilities;

pub use crate::config::FreeMotionLoopConfig;
pub use crate::error::{Result, SimulationError};
pub use crate::physics::collision_pipeline::{ICollisionPipeline, PlaneCollisionPipeline, SharedCollisionPipeline};
pub use crate::physics::constraint_params::{ConstraintOrder, ConstraintParams};
pub use crate::physics::constraint_solver::{ContactProjectionSolver, IConstraintSolver, SharedConstraintSolver};
pub use crate::physics::free_motion_animation_loop::FreeMotionAnimationLoop;
pub use crate::physics::free_motion_task::FreeMotionTask;
pub use crate::physics::mechanical_state::MechanicalState;
pub use crate::physics::node::{Contact, Node, NodeContext, SceneOperation, TraversalAction};
pub use crate::physics::simulation::Simulation;
pub use crate::physics::timestepper::ITimestepper;
pub use crate::physics::vec_id::VecId;
pub use crate::utilities::task_scheduling::{Task, TaskScheduler, TaskStatus};
