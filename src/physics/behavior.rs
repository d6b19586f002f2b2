use crate::physics::mechanical_state::MechanicalState;

/// Time-dependent behavior updated at the start of every step, before integration.
///
/// Typical implementations drive kinematic targets or refresh cached data derived from the current state.
pub trait IBehaviorModel: Send {
    /// Advances the behavior by `dt`. `state` is the mechanical state of the node owning the behavior, if any.
    fn update_position(&mut self, state: Option<&MechanicalState>, dt: f64);

    /// Refreshes internal data after every behavior of the scene has updated its position.
    fn update_internal_data(&mut self) {}
}
