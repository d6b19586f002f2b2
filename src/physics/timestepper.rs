use crate::error::Result;

/// Callback invoked at a fixed point of a step with the step duration.
pub type TimestepperStageHandler = Box<dyn FnMut(f64) + Send>;

/// Defines a type capable of updating the simulation state for a given elapsed time.
pub trait ITimestepper: Send {
    /// Prepares the scene for stepping. Must be called once before the first step; calling it again re-resolves
    /// the scene collaborators.
    fn init(&mut self) -> Result<()>;

    /// Performs one timestep of the given length. A zero `dt` uses the scene's default time step.
    fn step(&mut self, dt: f64) -> Result<()>;
}
