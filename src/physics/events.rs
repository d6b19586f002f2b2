/// Notification broadcast to every listener of the scene at fixed points of a step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimulationEvent {
    /// A step is starting.
    AnimateBegin { dt: f64 },
    /// A step finished integrating and time has advanced.
    AnimateEnd { dt: f64 },
    /// Derived/visual mappings were recomputed.
    UpdateMappingEnd { dt: f64 },
    /// Collision computation is starting.
    CollisionBegin,
    /// Collision computation is complete, response included.
    CollisionEnd,
}

/// Scene component reacting to [`SimulationEvent`]s. Listeners are fire-and-forget: nothing reads a result back.
pub trait IEventListener: Send {
    fn handle_event(&mut self, event: &SimulationEvent);
}
