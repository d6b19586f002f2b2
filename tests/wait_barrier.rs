//! Ordering guarantees of a step: sub-phase order and the wait barrier before collision response.

mod common;

use common::{build_scene, StageLog, DT};
use glam::DVec3;
use rust_freemotion::physics::behavior::IBehaviorModel;
use rust_freemotion::physics::events::{IEventListener, SimulationEvent};
use rust_freemotion::physics::ode_solver::{EulerExplicitSolver, IOdeSolver};
use rust_freemotion::{
    ConstraintParams, ContactProjectionSolver, FreeMotionAnimationLoop, FreeMotionLoopConfig, ICollisionPipeline,
    IConstraintSolver, MechanicalState, Node, PlaneCollisionPipeline, Simulation, TaskScheduler, VecId,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// ODE solver that takes its time and records when it finished.
struct SlowSolver {
    inner: EulerExplicitSolver,
    delay: Duration,
    log: StageLog,
    finished: Arc<Mutex<Vec<Instant>>>,
}

impl IOdeSolver for SlowSolver {
    fn solve(&mut self, node: &Node, dt: f64, x_result: VecId, v_result: VecId) {
        std::thread::sleep(self.delay);
        self.inner.solve(node, dt, x_result, v_result);
        self.finished.lock().unwrap().push(Instant::now());
        self.log.push("ode");
    }
}

struct RecordingPipeline {
    inner: PlaneCollisionPipeline,
    log: StageLog,
    responded: Arc<Mutex<Vec<Instant>>>,
}

impl ICollisionPipeline for RecordingPipeline {
    fn pre_compute(&mut self, root: &Node) {
        self.log.push("pre_compute");
        self.inner.pre_compute(root);
    }

    fn reset(&mut self, root: &Node) {
        self.log.push("reset");
        self.inner.reset(root);
    }

    fn detect(&mut self, root: &Node) {
        self.inner.detect(root);
        self.log.push("detect");
    }

    fn respond(&mut self, root: &Node) {
        self.responded.lock().unwrap().push(Instant::now());
        self.log.push("respond");
        self.inner.respond(root);
    }

    fn post_compute(&mut self, root: &Node) {
        self.log.push("post_compute");
        self.inner.post_compute(root);
    }
}

struct EventRecorder(StageLog);

impl IEventListener for EventRecorder {
    fn handle_event(&mut self, event: &SimulationEvent) {
        let name = match event {
            SimulationEvent::AnimateBegin { .. } => "AnimateBegin",
            SimulationEvent::AnimateEnd { .. } => "AnimateEnd",
            SimulationEvent::UpdateMappingEnd { .. } => "UpdateMappingEnd",
            SimulationEvent::CollisionBegin => "CollisionBegin",
            SimulationEvent::CollisionEnd => "CollisionEnd",
        };
        self.0.push(name);
    }
}

struct BehaviorRecorder(StageLog);

impl IBehaviorModel for BehaviorRecorder {
    fn update_position(&mut self, state: Option<&MechanicalState>, _dt: f64) {
        assert!(state.is_some());
        self.0.push("update_position");
    }

    fn update_internal_data(&mut self) {
        self.0.push("update_internal_data");
    }
}

struct RecordingConstraintSolver {
    inner: ContactProjectionSolver,
    log: StageLog,
}

impl IConstraintSolver for RecordingConstraintSolver {
    fn solve_constraint_velocity(
        &mut self,
        params: &ConstraintParams,
        root: &Node,
        v_result: VecId,
    ) -> rust_freemotion::Result<()> {
        self.log.push("solve");
        self.inner.solve_constraint_velocity(params, root, v_result)
    }

    fn solve_constraint(
        &mut self,
        params: &ConstraintParams,
        root: &Node,
        x_result: VecId,
        v_result: VecId,
    ) -> rust_freemotion::Result<()> {
        self.log.push("solve");
        self.inner.solve_constraint(params, root, x_result, v_result)
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Instrumented {
    animation_loop: FreeMotionAnimationLoop,
    log: StageLog,
    finished: Arc<Mutex<Vec<Instant>>>,
    responded: Arc<Mutex<Vec<Instant>>>,
}

fn instrumented_loop(config: FreeMotionLoopConfig, delay: Duration) -> Instrumented {
    let scene = build_scene(DVec3::new(0.1, -1.0, 0.0));
    let log = StageLog::default();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let responded = Arc::new(Mutex::new(Vec::new()));

    let ball_node = scene.root.children()[1].clone();
    assert_eq!(ball_node.name(), "ball");
    ball_node.set_ode_solver(SlowSolver {
        inner: EulerExplicitSolver::default(),
        delay,
        log: log.clone(),
        finished: Arc::clone(&finished),
    });
    ball_node.add_behavior(BehaviorRecorder(log.clone()));
    scene.root.add_listener(EventRecorder(log.clone()));
    scene.root.set_collision_pipeline(Arc::new(Mutex::new(RecordingPipeline {
        inner: PlaneCollisionPipeline::ground(0.0, 0.02),
        log: log.clone(),
        responded: Arc::clone(&responded),
    })));
    scene.root.set_constraint_solver(Arc::new(Mutex::new(RecordingConstraintSolver {
        inner: ContactProjectionSolver::default(),
        log: log.clone(),
    })));

    let mut animation_loop = FreeMotionAnimationLoop::new(scene.root, Arc::new(TaskScheduler::new()), config);
    let hook_log = log.clone();
    animation_loop.collisions_detected = Some(Box::new(move |_dt| hook_log.push("collisions_detected")));
    let hook_log = log.clone();
    animation_loop.constraints_solved = Some(Box::new(move |_dt| hook_log.push("constraints_solved")));
    animation_loop.configure().unwrap();

    Instrumented {
        animation_loop,
        log,
        finished,
        responded,
    }
}

/// The collision response starts only after the free motion task completed, however slow the integration is.
#[test]
fn collision_response_waits_for_free_motion() {
    for parallel_ode in [false, true] {
        let config = FreeMotionLoopConfig::default()
            .with_parallel_collision_detection_and_free_motion(true)
            .with_parallel_ode_solving(parallel_ode)
            .with_thread_count(2);
        let mut run = instrumented_loop(config, Duration::from_millis(30));
        for _ in 0..4 {
            run.animation_loop.step(DT).unwrap();
        }

        let finished = run.finished.lock().unwrap().clone();
        let responded = run.responded.lock().unwrap().clone();
        assert_eq!(finished.len(), 4);
        assert_eq!(responded.len(), 4);
        for (done, response) in finished.iter().zip(&responded) {
            assert!(response > done, "collision response started before free motion completed");
        }
    }
}

#[test]
fn sequential_step_runs_sub_phases_in_order() {
    let mut run = instrumented_loop(FreeMotionLoopConfig::default(), Duration::ZERO);
    run.animation_loop.step(DT).unwrap();
    assert_eq!(
        run.log.entries(),
        [
            "AnimateBegin",
            "update_position",
            "update_internal_data",
            "ode",
            "CollisionBegin",
            "pre_compute",
            "reset",
            "detect",
            "respond",
            "post_compute",
            "CollisionEnd",
            "collisions_detected",
            "solve",
            "constraints_solved",
            "AnimateEnd",
            "UpdateMappingEnd",
        ]
    );
}

#[test]
fn parallel_step_only_overlaps_free_motion_and_detection() {
    let config = FreeMotionLoopConfig::default()
        .with_parallel_collision_detection_and_free_motion(true)
        .with_thread_count(2);
    let mut run = instrumented_loop(config, Duration::from_millis(5));
    for _ in 0..3 {
        run.log.clear();
        run.animation_loop.step(DT).unwrap();
        let at = |entry: &str| run.log.position(entry).unwrap();

        assert!(at("AnimateBegin") < at("update_position"));
        assert!(at("update_internal_data") < at("CollisionBegin"));
        assert!(at("CollisionBegin") < at("pre_compute"));
        assert!(at("pre_compute") < at("reset"));
        assert!(at("reset") < at("ode"));
        assert!(at("reset") < at("detect"));
        assert!(at("ode") < at("respond"));
        assert!(at("detect") < at("respond"));
        assert!(at("respond") < at("post_compute"));
        assert!(at("post_compute") < at("CollisionEnd"));
        assert!(at("CollisionEnd") < at("solve"));
        assert!(at("solve") < at("AnimateEnd"));
        assert!(at("AnimateEnd") < at("UpdateMappingEnd"));
        assert_eq!(run.log.entries().len(), 16);
    }
}

#[test]
fn simulation_drives_the_loop() {
    let scene = build_scene(DVec3::ZERO);
    let animation_loop = FreeMotionAnimationLoop::new(
        Arc::clone(&scene.root),
        Arc::new(TaskScheduler::new()),
        FreeMotionLoopConfig::default(),
    );
    let mut simulation = Simulation::new(Arc::clone(&scene.root), animation_loop);
    assert!(simulation.animate(DT).is_err());
    simulation.init().unwrap();
    for _ in 0..3 {
        simulation.animate(0.0).unwrap();
    }
    assert_eq!(simulation.step_count(), 3);
    assert!((simulation.time() - 3.0 * DT).abs() < 1e-12);
}
