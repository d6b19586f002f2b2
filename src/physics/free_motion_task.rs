use crate::physics::constraint_params::{ConstraintOrder, ConstraintParams};
use crate::physics::node::Node;
use crate::physics::operations::{ProjectResponseOperation, PropagateDxOperation, VOpOperation};
use crate::physics::simulation_profiler::SimulationProfiler;
use crate::physics::vec_id::VecId;
use crate::utilities::task_scheduling::{Task, TaskStatus};
use crate::utilities::thread_dispatcher::IThreadDispatcher;
use std::sync::Arc;
use tracing::trace;

/// Computes the unconstrained motion of the whole scene for one step.
///
/// Every ODE solver of the scene integrates its subtree into the free velocity and free position vectors named by
/// the constraint parameters. The free velocity is then projected and pushed through mappings, and with
/// [`ConstraintOrder::PositionAndVelocity`] the free position of every state, mapped ones included, is recomputed
/// as `position + free_velocity * dt`.
///
/// The task only writes free vectors and solver scratch vectors, so it can run concurrently with collision
/// detection.
pub struct FreeMotionTask {
    root: Arc<Node>,
    params: ConstraintParams,
    dt: f64,
    dispatcher: Arc<dyn IThreadDispatcher>,
    parallel_ode_solving: bool,
    profiler: Arc<SimulationProfiler>,
    status: TaskStatus,
}

impl FreeMotionTask {
    /// # Arguments
    ///
    /// * `root` - Root of the scene to integrate.
    /// * `params` - Constraint parameters of the step; `x` and `v` name the free vectors.
    /// * `dt` - Duration of the step.
    /// * `dispatcher` - Dispatcher used to fan out the ODE solvers when `parallel_ode_solving` is set.
    /// * `parallel_ode_solving` - Whether independent solver subtrees are integrated concurrently.
    /// * `profiler` - Profiler receiving the free motion stage time.
    /// * `status` - Status notified when the task completes on a scheduler.
    pub fn new(
        root: Arc<Node>,
        params: ConstraintParams,
        dt: f64,
        dispatcher: Arc<dyn IThreadDispatcher>,
        parallel_ode_solving: bool,
        profiler: Arc<SimulationProfiler>,
        status: TaskStatus,
    ) -> Self {
        Self {
            root,
            params,
            dt,
            dispatcher,
            parallel_ode_solving,
            profiler,
            status,
        }
    }

    fn solve(node: &Node, dt: f64, x_result: VecId, v_result: VecId) {
        node.with_ode_solver(|solver| {
            if let Some(solver) = solver {
                solver.solve(node, dt, x_result, v_result);
            }
        });
    }

    fn integrate(&self) {
        let _timer = self.profiler.scope("FreeMotion");
        let (dt, x, v) = (self.dt, self.params.x(), self.params.v());
        let solver_nodes = Node::solver_nodes(&self.root);
        trace!(solvers = solver_nodes.len(), parallel = self.parallel_ode_solving, "free motion");
        if self.parallel_ode_solving && solver_nodes.len() > 1 {
            let count = solver_nodes.len();
            let solver_nodes = Arc::new(solver_nodes);
            self.dispatcher
                .dispatch_for(count, Arc::new(move |i: usize| Self::solve(&solver_nodes[i], dt, x, v)));
        } else {
            for node in &solver_nodes {
                Self::solve(node, dt, x, v);
            }
        }
    }
}

impl Task for FreeMotionTask {
    fn run(&mut self) {
        self.integrate();

        let v = self.params.v();
        self.root.execute(&mut ProjectResponseOperation { id: v });
        self.root.execute(&mut PropagateDxOperation { id: v });

        if self.params.order() == ConstraintOrder::PositionAndVelocity {
            self.root.execute(&mut VOpOperation {
                dest: self.params.x(),
                a: Some(VecId::Position),
                b: Some(v),
                factor: self.dt,
                mapped: true,
            });
        }
    }

    fn status(&self) -> &TaskStatus {
        &self.status
    }
}
