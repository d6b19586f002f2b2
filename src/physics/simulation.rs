use crate::error::Result;
use crate::physics::node::Node;
use crate::physics::timestepper::ITimestepper;
use std::sync::Arc;

/// Owns a scene and the timestepper animating it.
pub struct Simulation {
    root: Arc<Node>,
    /// The timestepper used to update the simulation state.
    pub timestepper: Box<dyn ITimestepper>,
    step_count: u64,
}

impl Simulation {
    /// Creates a simulation stepping `root` with `timestepper`. The timestepper is not initialized yet.
    pub fn new(root: Arc<Node>, timestepper: impl ITimestepper + 'static) -> Self {
        Self {
            root,
            timestepper: Box::new(timestepper),
            step_count: 0,
        }
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// Current simulated time of the root.
    pub fn time(&self) -> f64 {
        self.root.context().time
    }

    /// Gets the number of steps completed since creation.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Initializes the timestepper.
    pub fn init(&mut self) -> Result<()> {
        self.timestepper.init()
    }

    /// Performs one timestep of the given length. A zero `dt` uses the root's default time step.
    pub fn animate(&mut self, dt: f64) -> Result<()> {
        self.timestepper.step(dt)?;
        self.step_count += 1;
        Ok(())
    }
}
