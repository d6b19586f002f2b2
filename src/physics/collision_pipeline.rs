use crate::physics::mechanical_state::MechanicalState;
use crate::physics::node::{Contact, Node};
use crate::physics::vec_id::VecId;
use crate::utilities::BoundingBox;
use glam::DVec3;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Collision pipeline shared between the scene and the animation loop.
pub type SharedCollisionPipeline = Arc<Mutex<dyn ICollisionPipeline>>;

/// Collision handling split into the stages the animation loop interleaves with free motion.
///
/// While free motion may be running concurrently (between `reset` and the end of `detect`), implementations must
/// read only current positions and must not touch free positions or free velocities.
pub trait ICollisionPipeline: Send {
    /// Prepares collision models before a collision pass.
    fn pre_compute(&mut self, root: &Node);

    /// Clears the results of the previous pass.
    fn reset(&mut self, root: &Node);

    /// Finds contacts from the current positions.
    fn detect(&mut self, root: &Node);

    /// Creates constraint responses for the detected contacts.
    fn respond(&mut self, root: &Node);

    /// Cleans up after the response.
    fn post_compute(&mut self, _root: &Node) {}
}

struct CollisionModel {
    state: Arc<MechanicalState>,
    bounds: Option<BoundingBox>,
}

/// Detects contacts between the collision-enabled states of the scene and a static plane
/// `dot(normal, x) = offset`.
///
/// The broad phase rejects whole states whose bounding box stays beyond the contact distance; the narrow phase
/// tests every degree of freedom of the remaining ones. Contacts are stored on the root node on response.
pub struct PlaneCollisionPipeline {
    normal: DVec3,
    offset: f64,
    contact_distance: f64,
    models: Vec<CollisionModel>,
    detected: Vec<Contact>,
}

impl PlaneCollisionPipeline {
    /// Creates a pipeline against the plane `dot(normal, x) = offset`.
    ///
    /// # Arguments
    ///
    /// * `normal` - Plane normal, pointing to the free side. Normalized on construction.
    /// * `offset` - Plane offset along the normal.
    /// * `contact_distance` - Distance under which a degree of freedom is considered in contact.
    pub fn new(normal: DVec3, offset: f64, contact_distance: f64) -> Self {
        Self {
            normal: normal.normalize_or_zero(),
            offset,
            contact_distance,
            models: Vec::new(),
            detected: Vec::new(),
        }
    }

    /// Ground plane `y = height`.
    pub fn ground(height: f64, contact_distance: f64) -> Self {
        Self::new(DVec3::Y, height, contact_distance)
    }

    /// Contacts found by the last detection, before response.
    pub fn detected(&self) -> &[Contact] {
        &self.detected
    }

    fn collect_models(&mut self, root: &Node) {
        fn collect(node: &Node, models: &mut Vec<CollisionModel>) {
            if node.collision_enabled() && !node.is_mapped() {
                if let Some(state) = node.state() {
                    models.push(CollisionModel { state, bounds: None });
                }
            }
            for child in node.children() {
                collect(&child, models);
            }
        }
        self.models.clear();
        collect(root, &mut self.models);
    }
}

impl ICollisionPipeline for PlaneCollisionPipeline {
    fn pre_compute(&mut self, root: &Node) {
        self.collect_models(root);
    }

    fn reset(&mut self, root: &Node) {
        self.detected.clear();
        root.clear_contacts();
    }

    fn detect(&mut self, _root: &Node) {
        let (normal, offset, contact_distance) = (self.normal, self.offset, self.contact_distance);
        for model in &mut self.models {
            model.bounds = model.state.with_vector(VecId::Position, BoundingBox::from_points);
            let Some(bounds) = model.bounds else {
                continue;
            };
            if bounds.min_plane_distance(normal, offset) > contact_distance {
                continue;
            }
            model.state.with_vector(VecId::Position, |x| {
                for (index, position) in x.iter().enumerate() {
                    let distance = normal.dot(*position) - offset;
                    if distance <= contact_distance {
                        self.detected.push(Contact {
                            state: Arc::clone(&model.state),
                            index,
                            normal,
                            point: *position - normal * distance,
                            distance,
                        });
                    }
                }
            });
        }
        debug!(models = self.models.len(), contacts = self.detected.len(), "collision detection");
    }

    fn respond(&mut self, root: &Node) {
        root.set_contacts(self.detected.clone());
    }
}
