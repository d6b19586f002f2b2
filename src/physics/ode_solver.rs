use crate::physics::node::Node;
use crate::physics::operations::{
    AccelerationFromForceOperation, ComputeForceOperation, ProjectResponseOperation, VOpOperation,
};
use crate::physics::vec_id::VecId;

/// Time integrator owning the subtree of the node it is attached to.
pub trait IOdeSolver: Send {
    /// Integrates the subtree of `node` over `dt` starting from the current position and velocity, writing the
    /// result into `x_result` and `v_result` of every independent state.
    ///
    /// Implementations must only touch states inside the subtree so that disjoint subtrees can be solved
    /// concurrently.
    fn solve(&mut self, node: &Node, dt: f64, x_result: VecId, v_result: VecId);
}

/// Explicit Euler integration. The symplectic variant (the default) integrates velocity first and moves positions
/// with the updated velocity.
#[derive(Clone, Copy, Debug)]
pub struct EulerExplicitSolver {
    symplectic: bool,
}

impl Default for EulerExplicitSolver {
    fn default() -> Self {
        Self { symplectic: true }
    }
}

impl EulerExplicitSolver {
    pub fn new(symplectic: bool) -> Self {
        Self { symplectic }
    }
}

impl IOdeSolver for EulerExplicitSolver {
    fn solve(&mut self, node: &Node, dt: f64, x_result: VecId, v_result: VecId) {
        // Dx holds the acceleration while integrating.
        let acceleration = VecId::Dx;
        node.execute(&mut ComputeForceOperation {
            x: VecId::Position,
            v: VecId::Velocity,
            f: VecId::Force,
        });
        node.execute(&mut AccelerationFromForceOperation {
            f: VecId::Force,
            a: acceleration,
        });
        node.execute(&mut ProjectResponseOperation { id: acceleration });

        let mut velocity_update = VOpOperation {
            dest: v_result,
            a: Some(VecId::Velocity),
            b: Some(acceleration),
            factor: dt,
            mapped: false,
        };
        if self.symplectic {
            node.execute(&mut velocity_update);
            node.execute(&mut VOpOperation {
                dest: x_result,
                a: Some(VecId::Position),
                b: Some(v_result),
                factor: dt,
                mapped: false,
            });
        } else {
            node.execute(&mut VOpOperation {
                dest: x_result,
                a: Some(VecId::Position),
                b: Some(VecId::Velocity),
                factor: dt,
                mapped: false,
            });
            node.execute(&mut velocity_update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::mechanical_state::MechanicalState;
    use crate::physics::projective_constraint::FixedConstraint;
    use glam::DVec3;

    #[test]
    fn symplectic_euler_falls_under_gravity() {
        let root = Node::new("root");
        root.set_gravity(DVec3::new(0.0, -10.0, 0.0));
        let state = root.set_state(MechanicalState::new("particle", vec![DVec3::ZERO], 1.0));
        let mut solver = EulerExplicitSolver::default();
        solver.solve(&root, 0.1, VecId::FreePosition, VecId::FreeVelocity);

        assert_eq!(state.read(VecId::FreeVelocity), vec![DVec3::new(0.0, -1.0, 0.0)]);
        assert!((state.read(VecId::FreePosition)[0].y + 0.1).abs() < 1e-12);
        assert_eq!(state.read(VecId::Position), vec![DVec3::ZERO]);
    }

    #[test]
    fn explicit_euler_moves_with_old_velocity() {
        let root = Node::new("root");
        let state = root.set_state(MechanicalState::new("particle", vec![DVec3::ZERO], 1.0));
        EulerExplicitSolver::new(false).solve(&root, 0.1, VecId::FreePosition, VecId::FreeVelocity);
        assert_eq!(state.read(VecId::FreePosition), vec![DVec3::ZERO]);
    }

    #[test]
    fn fixed_degrees_of_freedom_do_not_accelerate() {
        let root = Node::new("root");
        let state = root.set_state(MechanicalState::new("pair", vec![DVec3::ZERO, DVec3::X], 1.0));
        root.add_projective_constraint(FixedConstraint::from_state(&state, vec![0]));
        EulerExplicitSolver::default().solve(&root, 0.1, VecId::FreePosition, VecId::FreeVelocity);
        let v = state.read(VecId::FreeVelocity);
        assert_eq!(v[0], DVec3::ZERO);
        assert!(v[1].y < 0.0);
    }
}
