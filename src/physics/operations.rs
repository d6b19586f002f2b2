//! Scene traversals used by the animation loop and the built-in solvers.
//!
//! Each operation is a small value carrying its parameters; run it with [`Node::execute`].

use crate::physics::events::SimulationEvent;
use crate::physics::node::{Node, SceneOperation, TraversalAction};
use crate::physics::vec_id::VecId;
use crate::utilities::BoundingBox;
use glam::DVec3;

/// (Re)allocates a vector in every state. With `reuse` the existing storage is zeroed in place, otherwise fresh
/// storage replaces it so no other holder of the old buffer can observe the new step.
#[derive(Clone, Copy, Debug)]
pub struct ReallocOperation {
    pub id: VecId,
    pub reuse: bool,
}

impl SceneOperation for ReallocOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            state.realloc(self.id, self.reuse);
        }
        TraversalAction::Continue
    }
}

/// `dest = src` in every state, mapped ones included.
#[derive(Clone, Copy, Debug)]
pub struct VInitOperation {
    pub dest: VecId,
    pub src: VecId,
}

impl SceneOperation for VInitOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            state.v_init(self.dest, self.src);
        }
        TraversalAction::Continue
    }
}

/// `dest = a + b * factor`. Mapped states are skipped unless `mapped` is set.
#[derive(Clone, Copy, Debug)]
pub struct VOpOperation {
    pub dest: VecId,
    pub a: Option<VecId>,
    pub b: Option<VecId>,
    pub factor: f64,
    pub mapped: bool,
}

impl SceneOperation for VOpOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            if self.mapped || !node.is_mapped() {
                state.v_op(self.dest, self.a, self.b, self.factor);
            }
        }
        TraversalAction::Continue
    }
}

/// Delivers an event to every listener, parents first.
#[derive(Clone, Copy, Debug)]
pub struct PropagateEventOperation {
    pub event: SimulationEvent,
}

impl SceneOperation for PropagateEventOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        let event = self.event;
        node.with_listeners(|listeners| {
            for listener in listeners.iter_mut() {
                listener.handle_event(&event);
            }
        });
        TraversalAction::Continue
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BehaviorUpdatePositionOperation {
    pub dt: f64,
}

impl SceneOperation for BehaviorUpdatePositionOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        let state = node.state();
        let dt = self.dt;
        node.with_behaviors(|behaviors| {
            for behavior in behaviors.iter_mut() {
                behavior.update_position(state.as_deref(), dt);
            }
        });
        TraversalAction::Continue
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateInternalDataOperation;

impl SceneOperation for UpdateInternalDataOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        node.with_behaviors(|behaviors| behaviors.iter_mut().for_each(|b| b.update_internal_data()));
        TraversalAction::Continue
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BeginIntegrationOperation {
    pub dt: f64,
}

impl SceneOperation for BeginIntegrationOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            state.begin_integration(self.dt);
        }
        TraversalAction::Continue
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EndIntegrationOperation {
    pub dt: f64,
}

impl SceneOperation for EndIntegrationOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            state.end_integration(self.dt);
        }
        TraversalAction::Continue
    }
}

/// Lets mechanical mappings update their geometric stiffness from the multipliers of their child state.
#[derive(Clone, Copy, Debug)]
pub struct ComputeGeometricStiffnessOperation {
    pub lambda: VecId,
}

impl SceneOperation for ComputeGeometricStiffnessOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            let lambda = self.lambda;
            node.with_mapping(|link| {
                if let Some(link) = link.as_mut().filter(|link| link.mechanical) {
                    let parent_x = link.from.read(VecId::Position);
                    let child_lambda = state.read(lambda);
                    link.mapping.compute_geometric_stiffness(&parent_x, &child_lambda);
                }
            });
        }
        TraversalAction::Continue
    }
}

/// Projects a correction-like vector through every projective constraint of the scene.
#[derive(Clone, Copy, Debug)]
pub struct ProjectResponseOperation {
    pub id: VecId,
}

impl SceneOperation for ProjectResponseOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            node.with_projective_constraints(|constraints| {
                if !constraints.is_empty() {
                    state.with_vector_mut(self.id, |dx| {
                        for constraint in constraints {
                            constraint.project_response(dx);
                        }
                    });
                }
            });
        }
        TraversalAction::Continue
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ProjectPositionAndVelocityOperation {
    pub x: VecId,
    pub v: VecId,
}

impl SceneOperation for ProjectPositionAndVelocityOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            node.with_projective_constraints(|constraints| {
                if constraints.is_empty() {
                    return;
                }
                state.with_vector_mut(self.x, |x| constraints.iter().for_each(|c| c.project_position(x)));
                state.with_vector_mut(self.v, |v| constraints.iter().for_each(|c| c.project_velocity(v)));
            });
        }
        TraversalAction::Continue
    }
}

/// Pushes a velocity-like vector down through mechanical mappings: `child = J * parent`.
#[derive(Clone, Copy, Debug)]
pub struct PropagateDxOperation {
    pub id: VecId,
}

impl SceneOperation for PropagateDxOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            let id = self.id;
            node.with_mapping(|link| {
                if let Some(link) = link.as_ref().filter(|link| link.mechanical) {
                    let parent = link.from.read(id);
                    state.with_vector_mut(id, |child| link.mapping.apply_j(&parent, child));
                }
            });
        }
        TraversalAction::Continue
    }
}

/// Recomputes positions and velocities of mechanically mapped states from their parents.
#[derive(Clone, Copy, Debug)]
pub struct PropagateXAndVOperation {
    pub x: VecId,
    pub v: VecId,
}

impl SceneOperation for PropagateXAndVOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            let (x_id, v_id) = (self.x, self.v);
            node.with_mapping(|link| {
                if let Some(link) = link.as_ref().filter(|link| link.mechanical) {
                    let parent_x = link.from.read(x_id);
                    let parent_v = link.from.read(v_id);
                    state.with_vector_mut(x_id, |x| link.mapping.apply(&parent_x, x));
                    state.with_vector_mut(v_id, |v| link.mapping.apply_j(&parent_v, v));
                }
            });
        }
        TraversalAction::Continue
    }
}

/// Refreshes the positions of every mapped state, visual mappings included.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateMappingOperation;

impl SceneOperation for UpdateMappingOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            node.with_mapping(|link| {
                if let Some(link) = link.as_ref() {
                    let parent_x = link.from.read(VecId::Position);
                    state.with_vector_mut(VecId::Position, |x| link.mapping.apply(&parent_x, x));
                }
            });
        }
        TraversalAction::Continue
    }
}

/// Sets the simulated time of every node.
#[derive(Clone, Copy, Debug)]
pub struct UpdateContextOperation {
    pub time: f64,
}

impl SceneOperation for UpdateContextOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        node.set_time(self.time);
        TraversalAction::Continue
    }
}

/// Recomputes node bounding boxes bottom-up: a node's box covers its own state and its children's boxes.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateBoundingBoxOperation;

impl SceneOperation for UpdateBoundingBoxOperation {
    fn process_node(&mut self, _node: &Node) -> TraversalAction {
        TraversalAction::Continue
    }

    fn finish_node(&mut self, node: &Node) {
        let mut bounds = node
            .state()
            .and_then(|state| state.with_vector(VecId::Position, BoundingBox::from_points));
        for child in node.children() {
            if let Some(child_bounds) = child.bounding_box() {
                bounds = Some(match bounds {
                    Some(current) => BoundingBox::create_merged_boxes(current, child_bounds),
                    None => child_bounds,
                });
            }
        }
        node.set_bounding_box(bounds);
    }
}

/// Accumulates `f(x, v)` in every state: external forces, gravity on independent states, and force fields.
/// Forces on mechanically mapped states are pulled back into their parents with `J^T` on the way up.
#[derive(Clone, Copy, Debug)]
pub struct ComputeForceOperation {
    pub x: VecId,
    pub v: VecId,
    pub f: VecId,
}

impl SceneOperation for ComputeForceOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        let Some(state) = node.state() else {
            return TraversalAction::Continue;
        };
        let weight = if node.is_mapped() {
            DVec3::ZERO
        } else {
            node.context().gravity * state.mass()
        };
        let external = state
            .has_vector(VecId::ExternalForce)
            .then(|| state.read(VecId::ExternalForce));
        state.with_vector_mut(self.f, |f| {
            for (i, fi) in f.iter_mut().enumerate() {
                *fi = weight + external.as_ref().map_or(DVec3::ZERO, |external| external[i]);
            }
        });

        let x = state.read(self.x);
        let v = state.read(self.v);
        node.with_force_fields(|fields| {
            if !fields.is_empty() {
                state.with_vector_mut(self.f, |f| {
                    for field in fields {
                        field.add_force(&x, &v, f);
                    }
                });
            }
        });
        TraversalAction::Continue
    }

    fn finish_node(&mut self, node: &Node) {
        if let Some(state) = node.state() {
            let f_id = self.f;
            node.with_mapping(|link| {
                if let Some(link) = link.as_ref().filter(|link| link.mechanical) {
                    let child_f = state.read(f_id);
                    link.from.with_vector_mut(f_id, |parent_f| link.mapping.apply_jt(&child_f, parent_f));
                }
            });
        }
    }
}

/// `a = f / m` on independent states.
#[derive(Clone, Copy, Debug)]
pub struct AccelerationFromForceOperation {
    pub f: VecId,
    pub a: VecId,
}

impl SceneOperation for AccelerationFromForceOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction {
        if let Some(state) = node.state() {
            if !node.is_mapped() {
                let inverse_mass = 1.0 / state.mass();
                let f = state.read(self.f);
                state.with_vector_mut(self.a, |a| {
                    for (ai, fi) in a.iter_mut().zip(&f) {
                        *ai = *fi * inverse_mass;
                    }
                });
            }
        }
        TraversalAction::Continue
    }
}
