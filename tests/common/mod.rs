//! Scene fixtures shared by the integration tests.
#![allow(dead_code)]

use glam::DVec3;
use rust_freemotion::physics::force_field::{ConstantForceField, Spring, SpringForceField};
use rust_freemotion::physics::mapping::TranslationMapping;
use rust_freemotion::physics::ode_solver::EulerExplicitSolver;
use rust_freemotion::physics::projective_constraint::FixedConstraint;
use rust_freemotion::{
    FreeMotionAnimationLoop, FreeMotionLoopConfig, MechanicalState, Node, PlaneCollisionPipeline, TaskScheduler,
    VecId,
};
use std::sync::{Arc, Mutex};

pub const DT: f64 = 0.01;

/// Vectors compared between runs.
pub const COMPARED_VECTORS: [VecId; 6] = [
    VecId::Position,
    VecId::Velocity,
    VecId::FreePosition,
    VecId::FreeVelocity,
    VecId::ConstraintDx,
    VecId::Lambda,
];

pub struct SceneFixture {
    pub root: Arc<Node>,
    /// Chain of particles hanging from a fixed first particle.
    pub chain: Arc<MechanicalState>,
    /// Single particle bouncing on the ground.
    pub ball: Arc<MechanicalState>,
    /// State mechanically mapped on the ball.
    pub marker: Arc<MechanicalState>,
}

/// Builds a scene with two independent solver subtrees, a mapped state and a ground plane.
pub fn build_scene(ball_velocity: DVec3) -> SceneFixture {
    let root = Node::new("root");
    root.set_dt(DT);
    root.set_collision_pipeline(Arc::new(Mutex::new(PlaneCollisionPipeline::ground(0.0, 0.02))));

    let chain_node = root.create_child("chain");
    chain_node.set_ode_solver(EulerExplicitSolver::default());
    chain_node.set_collision_enabled(true);
    let positions: Vec<DVec3> = (0..6).map(|i| DVec3::new(i as f64 * 0.05, 0.08, 0.0)).collect();
    let springs = (0..5).map(|i| Spring::at_rest(&positions, i, i + 1, 200.0, 0.5)).collect();
    let chain = chain_node.set_state(MechanicalState::new("chain", positions, 0.05));
    chain_node.add_force_field(SpringForceField::new(springs));
    chain_node.add_projective_constraint(FixedConstraint::from_state(&chain, vec![0]));

    let ball_node = root.create_child("ball");
    ball_node.set_ode_solver(EulerExplicitSolver::default());
    ball_node.set_collision_enabled(true);
    let ball = ball_node.set_state(
        MechanicalState::new("ball", vec![DVec3::new(1.0, 0.05, 0.0)], 1.0)
            .with_velocities(vec![ball_velocity])
            .unwrap(),
    );
    let marker_node = ball_node.create_child("marker");
    let marker = marker_node.set_state(MechanicalState::new("marker", vec![DVec3::new(1.0, 0.15, 0.0)], 1.0));
    marker_node.set_mapping(&ball, TranslationMapping::new(vec![0], vec![DVec3::new(0.0, 0.1, 0.0)]));
    marker_node.add_force_field(ConstantForceField::new(DVec3::new(0.2, 0.0, 0.0)));

    let obstacle = root.create_child("obstacle");
    obstacle.set_state(MechanicalState::new("obstacle", vec![DVec3::new(-1.0, 0.5, 0.0)], 1.0));

    SceneFixture {
        root,
        chain,
        ball,
        marker,
    }
}

/// Every compared vector of every state, in scene order.
pub fn snapshot(root: &Node) -> Vec<Vec<DVec3>> {
    root.states()
        .iter()
        .flat_map(|state| COMPARED_VECTORS.iter().map(move |&id| state.read(id)))
        .collect()
}

/// Builds the default scene, steps it `steps` times with `config` and returns the final snapshot.
pub fn run_scene(config: FreeMotionLoopConfig, ball_velocity: DVec3, dt: f64, steps: usize) -> Vec<Vec<DVec3>> {
    let scene = build_scene(ball_velocity);
    let mut animation_loop =
        FreeMotionAnimationLoop::new(Arc::clone(&scene.root), Arc::new(TaskScheduler::new()), config);
    animation_loop.configure().unwrap();
    for _ in 0..steps {
        animation_loop.step(dt).unwrap();
    }
    snapshot(&scene.root)
}

/// Shared, ordered log of stage names.
#[derive(Clone, Default)]
pub struct StageLog(Arc<Mutex<Vec<String>>>);

impl StageLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}
