use crate::physics::behavior::IBehaviorModel;
use crate::physics::collision_pipeline::SharedCollisionPipeline;
use crate::physics::constraint_solver::SharedConstraintSolver;
use crate::physics::events::IEventListener;
use crate::physics::force_field::IForceField;
use crate::physics::mapping::IMapping;
use crate::physics::mechanical_state::MechanicalState;
use crate::physics::ode_solver::IOdeSolver;
use crate::physics::projective_constraint::IProjectiveConstraint;
use crate::utilities::locks;
use crate::utilities::BoundingBox;
use glam::DVec3;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Simulation context of a node. Children inherit their parent's context when attached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeContext {
    /// Current simulated time.
    pub time: f64,
    /// Default time step, used when a step is requested with `dt == 0`.
    pub dt: f64,
    pub gravity: DVec3,
}

impl Default for NodeContext {
    fn default() -> Self {
        Self {
            time: 0.0,
            dt: 0.01,
            gravity: DVec3::new(0.0, -9.81, 0.0),
        }
    }
}

/// Contact produced by collision detection between one degree of freedom and an obstacle.
#[derive(Clone, Debug)]
pub struct Contact {
    /// State owning the colliding degree of freedom.
    pub state: Arc<MechanicalState>,
    pub index: usize,
    /// Unit normal pointing out of the obstacle.
    pub normal: DVec3,
    /// Closest point on the obstacle surface.
    pub point: DVec3,
    /// Signed distance at detection time; negative values are interpenetrations.
    pub distance: f64,
}

/// Mapping slot of a node whose state is derived from another state.
pub struct MappingLink {
    /// State the mapping reads from.
    pub from: Arc<MechanicalState>,
    pub mapping: Box<dyn IMapping>,
    /// Non-mechanical (visual) mappings only follow positions and never take part in force or velocity propagation.
    pub mechanical: bool,
}

/// Whether a traversal descends into the children of the node it just processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalAction {
    Continue,
    Prune,
}

/// Operation applied to every node of a subtree.
///
/// `process_node` is called top-down (parents before children) and `finish_node` bottom-up (children before
/// parents). A pruned node still receives its `finish_node` call.
pub trait SceneOperation {
    fn process_node(&mut self, node: &Node) -> TraversalAction;

    fn finish_node(&mut self, _node: &Node) {}
}

/// Node of the scene tree. Every component slot has its own lock so disjoint subtrees can be processed from
/// different threads.
pub struct Node {
    name: String,
    context: RwLock<NodeContext>,
    children: RwLock<Vec<Arc<Node>>>,
    state: RwLock<Option<Arc<MechanicalState>>>,
    mapping: Mutex<Option<MappingLink>>,
    force_fields: Mutex<Vec<Box<dyn IForceField>>>,
    projective_constraints: Mutex<Vec<Box<dyn IProjectiveConstraint>>>,
    ode_solver: Mutex<Option<Box<dyn IOdeSolver>>>,
    constraint_solver: RwLock<Option<SharedConstraintSolver>>,
    collision_pipeline: RwLock<Option<SharedCollisionPipeline>>,
    behaviors: Mutex<Vec<Box<dyn IBehaviorModel>>>,
    listeners: Mutex<Vec<Box<dyn IEventListener>>>,
    collision_enabled: AtomicBool,
    contacts: Mutex<Vec<Contact>>,
    bounding_box: Mutex<Option<BoundingBox>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("context", &self.context())
            .field("children", &locks::read(&self.children).len())
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Creates a root node with the default context.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::with_context(name, NodeContext::default())
    }

    pub fn with_context(name: impl Into<String>, context: NodeContext) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            context: RwLock::new(context),
            children: RwLock::new(Vec::new()),
            state: RwLock::new(None),
            mapping: Mutex::new(None),
            force_fields: Mutex::new(Vec::new()),
            projective_constraints: Mutex::new(Vec::new()),
            ode_solver: Mutex::new(None),
            constraint_solver: RwLock::new(None),
            collision_pipeline: RwLock::new(None),
            behaviors: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            collision_enabled: AtomicBool::new(false),
            contacts: Mutex::new(Vec::new()),
            bounding_box: Mutex::new(None),
        })
    }

    /// Creates a child inheriting this node's context and attaches it.
    pub fn create_child(&self, name: impl Into<String>) -> Arc<Node> {
        let child = Self::with_context(name, self.context());
        locks::write(&self.children).push(Arc::clone(&child));
        child
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> NodeContext {
        *locks::read(&self.context)
    }

    pub fn set_time(&self, time: f64) {
        locks::write(&self.context).time = time;
    }

    pub fn set_dt(&self, dt: f64) {
        locks::write(&self.context).dt = dt;
    }

    pub fn set_gravity(&self, gravity: DVec3) {
        locks::write(&self.context).gravity = gravity;
    }

    /// Snapshot of the children, so callers can recurse without holding the child list lock.
    pub fn children(&self) -> Vec<Arc<Node>> {
        locks::read(&self.children).clone()
    }

    pub fn set_state(&self, state: MechanicalState) -> Arc<MechanicalState> {
        let state = Arc::new(state);
        *locks::write(&self.state) = Some(Arc::clone(&state));
        state
    }

    pub fn state(&self) -> Option<Arc<MechanicalState>> {
        locks::read(&self.state).clone()
    }

    /// Makes this node's state a mechanical mapping of `from`.
    pub fn set_mapping(&self, from: &Arc<MechanicalState>, mapping: impl IMapping + 'static) {
        *locks::lock(&self.mapping) = Some(MappingLink {
            from: Arc::clone(from),
            mapping: Box::new(mapping),
            mechanical: true,
        });
    }

    /// Makes this node's state a visual mapping of `from`, only refreshed by mapping updates.
    pub fn set_visual_mapping(&self, from: &Arc<MechanicalState>, mapping: impl IMapping + 'static) {
        *locks::lock(&self.mapping) = Some(MappingLink {
            from: Arc::clone(from),
            mapping: Box::new(mapping),
            mechanical: false,
        });
    }

    /// Returns true if this node's state is derived from another state.
    pub fn is_mapped(&self) -> bool {
        locks::lock(&self.mapping).is_some()
    }

    /// Gives exclusive access to the mapping slot for the duration of `f`.
    pub fn with_mapping<R>(&self, f: impl FnOnce(&mut Option<MappingLink>) -> R) -> R {
        f(&mut locks::lock(&self.mapping))
    }

    pub fn add_force_field(&self, force_field: impl IForceField + 'static) {
        locks::lock(&self.force_fields).push(Box::new(force_field));
    }

    pub fn with_force_fields<R>(&self, f: impl FnOnce(&[Box<dyn IForceField>]) -> R) -> R {
        f(&locks::lock(&self.force_fields))
    }

    pub fn add_projective_constraint(&self, constraint: impl IProjectiveConstraint + 'static) {
        locks::lock(&self.projective_constraints).push(Box::new(constraint));
    }

    pub fn with_projective_constraints<R>(&self, f: impl FnOnce(&[Box<dyn IProjectiveConstraint>]) -> R) -> R {
        f(&locks::lock(&self.projective_constraints))
    }

    pub fn set_ode_solver(&self, solver: impl IOdeSolver + 'static) {
        *locks::lock(&self.ode_solver) = Some(Box::new(solver));
    }

    pub fn has_ode_solver(&self) -> bool {
        locks::lock(&self.ode_solver).is_some()
    }

    /// Gives exclusive access to the ODE solver slot for the duration of `f`.
    pub fn with_ode_solver<R>(&self, f: impl FnOnce(Option<&mut Box<dyn IOdeSolver>>) -> R) -> R {
        f(locks::lock(&self.ode_solver).as_mut())
    }

    pub fn set_constraint_solver(&self, solver: SharedConstraintSolver) {
        *locks::write(&self.constraint_solver) = Some(solver);
    }

    pub fn constraint_solver(&self) -> Option<SharedConstraintSolver> {
        locks::read(&self.constraint_solver).clone()
    }

    pub fn set_collision_pipeline(&self, pipeline: SharedCollisionPipeline) {
        *locks::write(&self.collision_pipeline) = Some(pipeline);
    }

    pub fn collision_pipeline(&self) -> Option<SharedCollisionPipeline> {
        locks::read(&self.collision_pipeline).clone()
    }

    pub fn add_behavior(&self, behavior: impl IBehaviorModel + 'static) {
        locks::lock(&self.behaviors).push(Box::new(behavior));
    }

    pub fn with_behaviors<R>(&self, f: impl FnOnce(&mut [Box<dyn IBehaviorModel>]) -> R) -> R {
        f(&mut locks::lock(&self.behaviors))
    }

    pub fn add_listener(&self, listener: impl IEventListener + 'static) {
        locks::lock(&self.listeners).push(Box::new(listener));
    }

    pub fn with_listeners<R>(&self, f: impl FnOnce(&mut [Box<dyn IEventListener>]) -> R) -> R {
        f(&mut locks::lock(&self.listeners))
    }

    /// Marks this node's state as a collision model.
    pub fn set_collision_enabled(&self, enabled: bool) {
        self.collision_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn collision_enabled(&self) -> bool {
        self.collision_enabled.load(Ordering::Relaxed)
    }

    /// Replaces the contacts stored on this node.
    pub fn set_contacts(&self, contacts: Vec<Contact>) {
        *locks::lock(&self.contacts) = contacts;
    }

    pub fn contacts(&self) -> Vec<Contact> {
        locks::lock(&self.contacts).clone()
    }

    pub fn clear_contacts(&self) {
        locks::lock(&self.contacts).clear();
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        *locks::lock(&self.bounding_box)
    }

    pub fn set_bounding_box(&self, bounding_box: Option<BoundingBox>) {
        *locks::lock(&self.bounding_box) = bounding_box;
    }

    /// Applies `operation` to this node and its descendants.
    pub fn execute(&self, operation: &mut dyn SceneOperation) {
        if operation.process_node(self) == TraversalAction::Continue {
            for child in self.children() {
                child.execute(operation);
            }
        }
        operation.finish_node(self);
    }

    /// Mechanical states of the subtree in top-down order.
    pub fn states(&self) -> Vec<Arc<MechanicalState>> {
        let mut states = Vec::new();
        self.visit(&mut |node: &Node| {
            if let Some(state) = node.state() {
                states.push(state);
            }
            TraversalAction::Continue
        });
        states
    }

    /// Contacts stored anywhere in the subtree.
    pub fn collect_contacts(&self) -> Vec<Contact> {
        let mut contacts = Vec::new();
        self.visit(&mut |node: &Node| {
            contacts.extend(node.contacts());
            TraversalAction::Continue
        });
        contacts
    }

    /// First constraint solver found searching down from this node.
    pub fn find_constraint_solver(&self) -> Option<SharedConstraintSolver> {
        let mut found = None;
        self.visit(&mut |node: &Node| {
            if found.is_none() {
                found = node.constraint_solver();
            }
            if found.is_some() {
                TraversalAction::Prune
            } else {
                TraversalAction::Continue
            }
        });
        found
    }

    /// First collision pipeline found searching down from this node.
    pub fn find_collision_pipeline(&self) -> Option<SharedCollisionPipeline> {
        let mut found = None;
        self.visit(&mut |node: &Node| {
            if found.is_none() {
                found = node.collision_pipeline();
            }
            if found.is_some() {
                TraversalAction::Prune
            } else {
                TraversalAction::Continue
            }
        });
        found
    }

    /// Topmost nodes of the subtree owning an ODE solver. Their subtrees are disjoint, and a solver node nested below
    /// another one is integrated by the outer solver.
    pub fn solver_nodes(root: &Arc<Node>) -> Vec<Arc<Node>> {
        fn collect(node: &Arc<Node>, out: &mut Vec<Arc<Node>>) {
            if node.has_ode_solver() {
                out.push(Arc::clone(node));
                return;
            }
            for child in node.children() {
                collect(&child, out);
            }
        }
        let mut nodes = Vec::new();
        collect(root, &mut nodes);
        nodes
    }

    fn visit(&self, f: &mut dyn FnMut(&Node) -> TraversalAction) {
        struct Visitor<'a>(&'a mut dyn FnMut(&Node) -> TraversalAction);
        impl SceneOperation for Visitor<'_> {
            fn process_node(&mut self, node: &Node) -> TraversalAction {
                (self.0)(node)
            }
        }
        self.execute(&mut Visitor(f));
    }
}
