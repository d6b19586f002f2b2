use crate::error::Result;
use crate::physics::constraint_params::ConstraintParams;
use crate::physics::mechanical_state::MechanicalState;
use crate::physics::node::{Contact, Node};
use crate::physics::vec_id::VecId;
use glam::DVec3;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Constraint solver shared between the scene and the animation loop.
pub type SharedConstraintSolver = Arc<Mutex<dyn IConstraintSolver>>;

/// Solves the constraints of the scene starting from the free motion.
pub trait IConstraintSolver: Send {
    /// Velocity-only solve: writes constraint-corrected velocities into `v_result`.
    fn solve_constraint_velocity(&mut self, params: &ConstraintParams, root: &Node, v_result: VecId) -> Result<()>;

    /// Position and velocity solve: writes corrected positions into `x_result` and velocities into `v_result`.
    fn solve_constraint(
        &mut self,
        params: &ConstraintParams,
        root: &Node,
        x_result: VecId,
        v_result: VecId,
    ) -> Result<()>;

    /// Vector holding the correction applied by the last solve.
    fn correction_vector_id(&self) -> VecId {
        VecId::ConstraintDx
    }

    /// Vector holding the multipliers of the last solve.
    fn multiplier_vector_id(&self) -> VecId {
        VecId::Lambda
    }

    fn name(&self) -> &str;
}

/// Resolves unilateral contacts by projecting each contact point out of the obstacle and removing the approaching
/// normal velocity.
///
/// Contacts are processed one after the other in detection order, each one seeing the corrections of the previous
/// ones on the same degree of freedom. States without contacts receive exactly their free motion.
#[derive(Clone, Debug)]
pub struct ContactProjectionSolver {
    name: String,
    last_contact_count: usize,
}

impl Default for ContactProjectionSolver {
    fn default() -> Self {
        Self::new("default contact projection solver")
    }
}

struct StateCorrection {
    state: Arc<MechanicalState>,
    free_x: Vec<DVec3>,
    free_v: Vec<DVec3>,
    dx: Vec<DVec3>,
    dv: Vec<DVec3>,
}

impl ContactProjectionSolver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_contact_count: 0,
        }
    }

    /// Gets the number of contacts handled by the last solve.
    pub fn last_contact_count(&self) -> usize {
        self.last_contact_count
    }

    fn compute_corrections(params: &ConstraintParams, contacts: &[Contact]) -> Vec<StateCorrection> {
        let mut corrections: Vec<StateCorrection> = Vec::new();
        for contact in contacts {
            let position = match corrections.iter().position(|c| Arc::ptr_eq(&c.state, &contact.state)) {
                Some(position) => position,
                None => {
                    let state = Arc::clone(&contact.state);
                    let size = state.size();
                    corrections.push(StateCorrection {
                        free_x: state.read(params.x()),
                        free_v: state.read(params.v()),
                        dx: vec![DVec3::ZERO; size],
                        dv: vec![DVec3::ZERO; size],
                        state,
                    });
                    corrections.len() - 1
                }
            };
            let correction = &mut corrections[position];
            let i = contact.index;
            if i >= correction.free_x.len() {
                continue;
            }

            let penetration = contact.normal.dot(correction.free_x[i] + correction.dx[i] - contact.point);
            if penetration < 0.0 {
                correction.dx[i] -= contact.normal * penetration;
            }
            let approach = contact.normal.dot(correction.free_v[i] + correction.dv[i]);
            if approach < 0.0 {
                correction.dv[i] -= contact.normal * approach;
            }
        }
        corrections
    }

    fn apply(
        &mut self,
        params: &ConstraintParams,
        root: &Node,
        x_result: Option<VecId>,
        v_result: VecId,
    ) -> Result<()> {
        let contacts = root.collect_contacts();
        let corrections = Self::compute_corrections(params, &contacts);
        let dt = params.dt();

        for state in root.states() {
            let correction = corrections.iter().find(|c| Arc::ptr_eq(&c.state, &state));
            match correction {
                None => {
                    if let Some(x_result) = x_result {
                        state.v_init(x_result, params.x());
                    }
                    state.v_init(v_result, params.v());
                    state.realloc(params.dx(), true);
                    state.realloc(params.lambda(), true);
                }
                Some(correction) => {
                    let mass = state.mass();
                    let v: Vec<DVec3> = correction.free_v.iter().zip(&correction.dv).map(|(v, dv)| *v + *dv).collect();
                    state.write(v_result, v)?;
                    let applied = match x_result.filter(|_| params.corrects_positions()) {
                        Some(x_result) => {
                            let x = correction.free_x.iter().zip(&correction.dx).map(|(x, dx)| *x + *dx).collect();
                            state.write(x_result, x)?;
                            correction.dx.clone()
                        }
                        None => correction.dv.iter().map(|dv| *dv * dt).collect(),
                    };
                    state.write(params.dx(), applied)?;
                    state.write(params.lambda(), correction.dv.iter().map(|dv| *dv * mass).collect())?;
                }
            }
        }
        self.last_contact_count = contacts.len();
        trace!(solver = %self.name, contacts = contacts.len(), "constraints solved");
        Ok(())
    }
}

impl IConstraintSolver for ContactProjectionSolver {
    fn solve_constraint_velocity(&mut self, params: &ConstraintParams, root: &Node, v_result: VecId) -> Result<()> {
        self.apply(params, root, None, v_result)
    }

    fn solve_constraint(
        &mut self,
        params: &ConstraintParams,
        root: &Node,
        x_result: VecId,
        v_result: VecId,
    ) -> Result<()> {
        self.apply(params, root, Some(x_result), v_result)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
