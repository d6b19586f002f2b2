use crate::physics::mechanical_state::MechanicalState;
use crate::physics::vec_id::VecId;
use glam::DVec3;

/// Constraint enforced by projecting vectors onto the admissible subspace (fixed points, sliding planes, ...).
pub trait IProjectiveConstraint: Send {
    /// Projects a displacement, acceleration or velocity correction.
    fn project_response(&self, dx: &mut [DVec3]);

    fn project_position(&self, x: &mut [DVec3]);

    fn project_velocity(&self, v: &mut [DVec3]);
}

/// Keeps a set of degrees of freedom at their anchor positions with zero velocity.
#[derive(Clone, Debug)]
pub struct FixedConstraint {
    indices: Vec<usize>,
    anchors: Vec<DVec3>,
}

impl FixedConstraint {
    /// Fixes `indices` at the state's current positions. Indices outside the state are dropped.
    pub fn from_state(state: &MechanicalState, indices: Vec<usize>) -> Self {
        let (indices, anchors): (Vec<usize>, Vec<DVec3>) = state.with_vector(VecId::Position, |x| {
            indices
                .into_iter()
                .filter_map(|i| x.get(i).map(|anchor| (i, *anchor)))
                .unzip()
        });
        Self { indices, anchors }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl IProjectiveConstraint for FixedConstraint {
    fn project_response(&self, dx: &mut [DVec3]) {
        for &i in &self.indices {
            if let Some(dxi) = dx.get_mut(i) {
                *dxi = DVec3::ZERO;
            }
        }
    }

    fn project_position(&self, x: &mut [DVec3]) {
        for (&i, anchor) in self.indices.iter().zip(&self.anchors) {
            if let Some(xi) = x.get_mut(i) {
                *xi = *anchor;
            }
        }
    }

    fn project_velocity(&self, v: &mut [DVec3]) {
        self.project_response(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_indices_are_dropped() {
        let state = MechanicalState::new("pair", vec![DVec3::X, DVec3::Y], 1.0);
        let constraint = FixedConstraint::from_state(&state, vec![1, 5]);
        assert_eq!(constraint.indices(), &[1]);

        let mut x = [DVec3::ZERO; 2];
        constraint.project_position(&mut x);
        assert_eq!(x, [DVec3::ZERO, DVec3::Y]);

        let mut short = [DVec3::ONE];
        constraint.project_response(&mut short);
        assert_eq!(short, [DVec3::ONE]);
    }
}
