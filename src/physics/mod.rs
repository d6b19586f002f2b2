pub mod behavior;
pub mod collision_pipeline;
pub mod constraint_params;
pub mod constraint_solver;
pub mod events;
pub mod force_field;
pub mod free_motion_animation_loop;
pub mod free_motion_task;
pub mod mapping;
pub mod mechanical_state;
pub mod node;
pub mod ode_solver;
pub mod operations;
pub mod projective_constraint;
pub mod simulation;
pub mod simulation_profiler;
pub mod timestepper;
pub mod vec_id;
