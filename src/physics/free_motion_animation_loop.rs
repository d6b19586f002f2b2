use crate::config::FreeMotionLoopConfig;
use crate::error::{Result, SimulationError};
use crate::physics::collision_pipeline::SharedCollisionPipeline;
use crate::physics::constraint_params::{ConstraintOrder, ConstraintParams};
use crate::physics::constraint_solver::{ContactProjectionSolver, SharedConstraintSolver};
use crate::physics::events::SimulationEvent;
use crate::physics::free_motion_task::FreeMotionTask;
use crate::physics::node::Node;
use crate::physics::operations::{
    BeginIntegrationOperation, BehaviorUpdatePositionOperation, ComputeGeometricStiffnessOperation,
    EndIntegrationOperation, ProjectPositionAndVelocityOperation, ProjectResponseOperation,
    PropagateDxOperation, PropagateEventOperation, PropagateXAndVOperation, ReallocOperation,
    UpdateBoundingBoxOperation, UpdateContextOperation, UpdateInternalDataOperation, UpdateMappingOperation,
    VInitOperation, VOpOperation,
};
use crate::physics::simulation_profiler::SimulationProfiler;
use crate::physics::timestepper::{ITimestepper, TimestepperStageHandler};
use crate::physics::vec_id::VecId;
use crate::utilities::locks;
use crate::utilities::task_scheduling::{Task, TaskScheduler, TaskStatus};
use std::sync::{Arc, Mutex};
use tracing::{debug, debug_span, info, trace, warn};

/// Animation loop running, every step: free motion of the whole scene, collision detection, then one constraint
/// solve starting from the free motion.
///
/// Free motion and collision detection read disjoint vectors (free position/velocity against current position),
/// which lets the loop overlap them on the task scheduler. The collision response waits for the free motion to
/// complete in every mode.
///
/// The loop resolves its constraint solver and collision pipeline from the scene in [`configure`](Self::configure)
/// and keeps those references for its lifetime.
pub struct FreeMotionAnimationLoop {
    root: Arc<Node>,
    scheduler: Arc<TaskScheduler>,
    config: FreeMotionLoopConfig,
    default_solver: Option<SharedConstraintSolver>,
    constraint_solver: Option<SharedConstraintSolver>,
    collision_pipeline: Option<SharedCollisionPipeline>,
    profiler: Arc<SimulationProfiler>,
    configured: bool,
    /// Fires after the collision response, before constraints are solved.
    pub collisions_detected: Option<TimestepperStageHandler>,
    /// Fires after the constraint correction was projected and propagated.
    pub constraints_solved: Option<TimestepperStageHandler>,
}

impl FreeMotionAnimationLoop {
    /// Creates a loop for the scene rooted at `root`.
    ///
    /// # Arguments
    ///
    /// * `root` - Root of the scene. Solvers and the collision pipeline are searched below it.
    /// * `scheduler` - Scheduler used by the parallel switches. It is initialized on configure if a switch needs it.
    /// * `config` - Loop switches.
    pub fn new(root: Arc<Node>, scheduler: Arc<TaskScheduler>, config: FreeMotionLoopConfig) -> Self {
        let default_solver: SharedConstraintSolver = Arc::new(Mutex::new(ContactProjectionSolver::default()));
        Self {
            root,
            scheduler,
            config,
            default_solver: Some(default_solver),
            constraint_solver: None,
            collision_pipeline: None,
            profiler: Arc::new(SimulationProfiler::new(16)),
            configured: false,
            collisions_detected: None,
            constraints_solved: None,
        }
    }

    /// Replaces the solver installed when the scene has none. `None` makes a scene without a constraint solver a
    /// configuration error.
    pub fn with_default_solver(mut self, solver: Option<SharedConstraintSolver>) -> Self {
        self.default_solver = solver;
        self
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// Switches fixed when the loop was created.
    pub fn config(&self) -> &FreeMotionLoopConfig {
        &self.config
    }

    /// Constraint solver resolved by configure.
    pub fn constraint_solver(&self) -> Option<&SharedConstraintSolver> {
        self.constraint_solver.as_ref()
    }

    pub fn collision_pipeline(&self) -> Option<&SharedCollisionPipeline> {
        self.collision_pipeline.as_ref()
    }

    /// Stage timings of the last step. Empty unless the `profile` feature is enabled.
    pub fn profiler(&self) -> &SimulationProfiler {
        &self.profiler
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Resolves the scene collaborators and prepares the scheduler.
    ///
    /// The first constraint solver found below the root is used. Without one, the default solver is registered on
    /// the root and a warning is logged; without a default solver either, configuration fails.
    pub fn configure(&mut self) -> Result<()> {
        let reuse = !self.config.thread_safe_visitor;
        self.root.execute(&mut ReallocOperation { id: VecId::Dx, reuse });
        self.root.execute(&mut ReallocOperation { id: VecId::DForce, reuse });

        let solver = match self.root.find_constraint_solver() {
            Some(solver) => solver,
            None => {
                let solver = self.default_solver.take().ok_or(SimulationError::NoConstraintSolver)?;
                let name = locks::lock(&solver).name().to_owned();
                warn!(solver = %name, "no constraint solver found in the scene, using the default one");
                self.root.set_constraint_solver(Arc::clone(&solver));
                solver
            }
        };
        self.constraint_solver = Some(solver);
        self.collision_pipeline = self.root.find_collision_pipeline();
        if self.collision_pipeline.is_none() {
            debug!("no collision pipeline in the scene, collision stages are skipped");
        }

        if self.config.uses_scheduler() {
            self.scheduler.initialize(self.config.thread_count);
            info!(
                threads = self.scheduler.thread_count(),
                parallel_collision_detection_and_free_motion = self.config.parallel_collision_detection_and_free_motion,
                parallel_ode_solving = self.config.parallel_ode_solving,
                "free motion animation loop running in parallel"
            );
        }
        self.configured = true;
        Ok(())
    }

    fn resolve_dt(&self, dt: f64) -> Result<f64> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimulationError::InvalidTimestep(dt));
        }
        if dt > 0.0 {
            return Ok(dt);
        }
        let default_dt = self.root.context().dt;
        if default_dt.is_finite() && default_dt > 0.0 {
            Ok(default_dt)
        } else {
            Err(SimulationError::InvalidTimestep(default_dt))
        }
    }

    /// Advances the scene by `dt`, or by the root's default time step if `dt` is zero.
    pub fn step(&mut self, dt: f64) -> Result<()> {
        if !self.configured {
            return Err(SimulationError::NotConfigured);
        }
        let dt = self.resolve_dt(dt)?;
        if self.config.uses_scheduler() && !self.scheduler.is_initialized() {
            return Err(SimulationError::SchedulerNotInitialized);
        }

        let root = Arc::clone(&self.root);
        let start_time = root.context().time;
        let _span = debug_span!("step", time = start_time, dt).entered();
        debug!("step begin");
        let profiler = Arc::clone(&self.profiler);
        profiler.clear();
        let _step_timer = profiler.scope("Step");

        let (correction, multiplier) = match &self.constraint_solver {
            Some(solver) => {
                let solver = locks::lock(solver);
                (solver.correction_vector_id(), solver.multiplier_vector_id())
            }
            None => (VecId::ConstraintDx, VecId::Lambda),
        };
        let params = ConstraintParams::new(
            VecId::FreePosition,
            VecId::FreeVelocity,
            correction,
            multiplier,
            self.config.constraint_order(),
            dt,
        );

        let reuse = !self.config.thread_safe_visitor;
        for id in [VecId::Dx, VecId::DForce, VecId::FreePosition, VecId::FreeVelocity] {
            root.execute(&mut ReallocOperation { id, reuse });
        }
        root.execute(&mut VInitOperation {
            dest: VecId::FreePosition,
            src: VecId::Position,
        });
        root.execute(&mut VInitOperation {
            dest: VecId::FreeVelocity,
            src: VecId::Velocity,
        });

        root.execute(&mut PropagateEventOperation {
            event: SimulationEvent::AnimateBegin { dt },
        });
        {
            let _timer = profiler.scope("BehaviorUpdate");
            root.execute(&mut BehaviorUpdatePositionOperation { dt });
            root.execute(&mut UpdateInternalDataOperation);
        }
        root.execute(&mut BeginIntegrationOperation { dt });

        // Last step's multipliers are impulses; 1/dt turns them into forces for the geometric stiffness.
        root.execute(&mut VOpOperation {
            dest: multiplier,
            a: None,
            b: Some(multiplier),
            factor: 1.0 / dt,
            mapped: true,
        });
        root.execute(&mut ComputeGeometricStiffnessOperation { lambda: multiplier });

        self.free_motion_and_collision_detection(&params)?;
        if let Some(handler) = self.collisions_detected.as_mut() {
            handler(dt);
        }

        self.solve_constraints(&params)?;
        if let Some(handler) = self.constraints_solved.as_mut() {
            handler(dt);
        }

        root.execute(&mut EndIntegrationOperation { dt });
        root.execute(&mut ProjectPositionAndVelocityOperation {
            x: VecId::Position,
            v: VecId::Velocity,
        });
        root.execute(&mut PropagateXAndVOperation {
            x: VecId::Position,
            v: VecId::Velocity,
        });

        root.execute(&mut UpdateContextOperation { time: start_time + dt });

        root.execute(&mut PropagateEventOperation {
            event: SimulationEvent::AnimateEnd { dt },
        });
        {
            let _timer = profiler.scope("UpdateMapping");
            root.execute(&mut UpdateMappingOperation);
            root.execute(&mut PropagateEventOperation {
                event: SimulationEvent::UpdateMappingEnd { dt },
            });
        }
        if self.config.update_bounding_boxes {
            let _timer = profiler.scope("UpdateBBox");
            root.execute(&mut UpdateBoundingBoxOperation);
            if let Some(bounds) = root.bounding_box() {
                trace!(%bounds, "scene bounds");
            }
        }
        debug!(time = start_time + dt, "step end");
        Ok(())
    }

    fn free_motion_and_collision_detection(&self, params: &ConstraintParams) -> Result<()> {
        let status = TaskStatus::new();
        let mut task = FreeMotionTask::new(
            Arc::clone(&self.root),
            *params,
            params.dt(),
            self.scheduler.clone(),
            self.config.parallel_ode_solving,
            Arc::clone(&self.profiler),
            status.clone(),
        );

        if !self.config.parallel_collision_detection_and_free_motion {
            let _timer = self.profiler.scope("FreeMotion+CollisionDetection");
            task.run();
            self.compute_collision();
            return Ok(());
        }

        let _timer = self.profiler.scope("FreeMotion+CollisionDetection");
        self.pre_collision_computation();
        let pipeline = self.collision_pipeline.as_ref();
        if let Some(pipeline) = pipeline {
            let _timer = self.profiler.scope("CollisionReset");
            locks::lock(pipeline).reset(&self.root);
        }

        self.scheduler.add_task(task)?;

        if let Some(pipeline) = pipeline {
            let _timer = self.profiler.scope("CollisionDetection");
            locks::lock(pipeline).detect(&self.root);
        }
        {
            let _timer = self.profiler.scope("WaitFreeMotion");
            self.scheduler.work_until_done(&status);
        }
        if let Some(pipeline) = pipeline {
            let _timer = self.profiler.scope("CollisionResponse");
            locks::lock(pipeline).respond(&self.root);
        }
        self.post_collision_computation();
        Ok(())
    }

    fn pre_collision_computation(&self) {
        self.root.execute(&mut PropagateEventOperation {
            event: SimulationEvent::CollisionBegin,
        });
        if let Some(pipeline) = &self.collision_pipeline {
            let _timer = self.profiler.scope("CollisionPreCompute");
            locks::lock(pipeline).pre_compute(&self.root);
        }
    }

    fn post_collision_computation(&self) {
        if let Some(pipeline) = &self.collision_pipeline {
            locks::lock(pipeline).post_compute(&self.root);
        }
        self.root.execute(&mut PropagateEventOperation {
            event: SimulationEvent::CollisionEnd,
        });
    }

    /// Runs every collision stage in order on the calling thread.
    fn compute_collision(&self) {
        let _timer = self.profiler.scope("CollisionDetection");
        self.pre_collision_computation();
        if let Some(pipeline) = &self.collision_pipeline {
            let mut pipeline = locks::lock(pipeline);
            pipeline.reset(&self.root);
            pipeline.detect(&self.root);
            pipeline.respond(&self.root);
        }
        self.post_collision_computation();
    }

    fn solve_constraints(&self, params: &ConstraintParams) -> Result<()> {
        let Some(solver) = &self.constraint_solver else {
            return Ok(());
        };
        let _timer = self.profiler.scope("ConstraintSolver");
        let correction = {
            let mut solver = locks::lock(solver);
            match params.order() {
                ConstraintOrder::VelocityOnly => {
                    solver.solve_constraint_velocity(params, &self.root, VecId::Velocity)?;
                    self.root.execute(&mut VOpOperation {
                        dest: VecId::Position,
                        a: Some(VecId::Position),
                        b: Some(VecId::Velocity),
                        factor: params.dt(),
                        mapped: false,
                    });
                }
                ConstraintOrder::PositionAndVelocity => {
                    solver.solve_constraint(params, &self.root, VecId::Position, VecId::Velocity)?;
                }
            }
            solver.correction_vector_id()
        };
        self.root.execute(&mut ProjectResponseOperation { id: correction });
        self.root.execute(&mut PropagateDxOperation { id: correction });
        Ok(())
    }
}

impl ITimestepper for FreeMotionAnimationLoop {
    fn init(&mut self) -> Result<()> {
        self.configure()
    }

    fn step(&mut self, dt: f64) -> Result<()> {
        FreeMotionAnimationLoop::step(self, dt)
    }
}
