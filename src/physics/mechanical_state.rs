use crate::error::{Result, SimulationError};
use crate::physics::vec_id::VecId;
use crate::utilities::locks;
use glam::DVec3;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

type SharedVector = Arc<RwLock<Vec<DVec3>>>;

/// Degrees of freedom of one simulated body and the vectors attached to them.
///
/// Every role lives behind its own lock, so stages touching disjoint roles (free motion writing `FreePosition` and
/// `FreeVelocity` while collision detection reads `Position`) never contend. Vectors are allocated on first use,
/// zero-filled and sized to the degree-of-freedom count.
pub struct MechanicalState {
    name: String,
    size: usize,
    /// Mass of each degree of freedom.
    mass: f64,
    vectors: RwLock<BTreeMap<VecId, SharedVector>>,
}

impl std::fmt::Debug for MechanicalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MechanicalState")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mass", &self.mass)
            .finish_non_exhaustive()
    }
}

impl MechanicalState {
    /// Creates a state at rest at `positions`, each degree of freedom weighing `mass`.
    pub fn new(name: impl Into<String>, positions: Vec<DVec3>, mass: f64) -> Self {
        let size = positions.len();
        let mut vectors = BTreeMap::new();
        vectors.insert(VecId::Position, Arc::new(RwLock::new(positions)));
        vectors.insert(VecId::Velocity, Arc::new(RwLock::new(vec![DVec3::ZERO; size])));
        Self {
            name: name.into(),
            size,
            mass,
            vectors: RwLock::new(vectors),
        }
    }

    /// Sets the initial velocity of every degree of freedom.
    pub fn with_velocities(self, velocities: Vec<DVec3>) -> Result<Self> {
        self.write(VecId::Velocity, velocities)?;
        Ok(self)
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the number of degrees of freedom.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Gets whether a vector has been allocated for the role.
    pub fn has_vector(&self, id: VecId) -> bool {
        locks::read(&self.vectors).contains_key(&id)
    }

    fn buffer(&self, id: VecId) -> SharedVector {
        if let Some(buffer) = locks::read(&self.vectors).get(&id) {
            return Arc::clone(buffer);
        }
        let size = self.size;
        Arc::clone(
            locks::write(&self.vectors)
                .entry(id)
                .or_insert_with(|| Arc::new(RwLock::new(vec![DVec3::ZERO; size]))),
        )
    }

    /// Copies the vector out of the state.
    pub fn read(&self, id: VecId) -> Vec<DVec3> {
        locks::read(&self.buffer(id)).clone()
    }

    /// Runs `f` with read access to the vector.
    pub fn with_vector<R>(&self, id: VecId, f: impl FnOnce(&[DVec3]) -> R) -> R {
        let buffer = self.buffer(id);
        let guard = locks::read(&buffer);
        f(&guard)
    }

    /// Runs `f` with write access to the vector. The vector length cannot change.
    pub fn with_vector_mut<R>(&self, id: VecId, f: impl FnOnce(&mut [DVec3]) -> R) -> R {
        let buffer = self.buffer(id);
        let mut guard = locks::write(&buffer);
        f(&mut guard)
    }

    /// Replaces the vector's contents.
    pub fn write(&self, id: VecId, values: Vec<DVec3>) -> Result<()> {
        if values.len() != self.size {
            return Err(SimulationError::VectorSizeMismatch {
                state: self.name.clone(),
                id,
                expected: self.size,
                actual: values.len(),
            });
        }
        *locks::write(&self.buffer(id)) = values;
        Ok(())
    }

    /// `dest = src`.
    pub fn v_init(&self, dest: VecId, src: VecId) {
        if dest == src {
            return;
        }
        let values = self.read(src);
        *locks::write(&self.buffer(dest)) = values;
    }

    /// `dest = a + b * factor`, a missing `a` or `b` counting as zero.
    pub fn v_op(&self, dest: VecId, a: Option<VecId>, b: Option<VecId>, factor: f64) {
        let a = a.map(|id| self.read(id));
        let b = b.map(|id| self.read(id));
        self.with_vector_mut(dest, |dest| {
            for (i, value) in dest.iter_mut().enumerate() {
                let lhs = a.as_ref().map_or(DVec3::ZERO, |a| a[i]);
                let rhs = b.as_ref().map_or(DVec3::ZERO, |b| b[i]);
                *value = lhs + rhs * factor;
            }
        });
    }

    /// Makes sure the role is allocated and zeroed.
    ///
    /// With `reuse` the existing buffer is cleared in place. Without it a fresh buffer is swapped in, so any
    /// traversal still holding the previous buffer is unaffected.
    pub fn realloc(&self, id: VecId, reuse: bool) {
        if reuse {
            self.with_vector_mut(id, |values| values.fill(DVec3::ZERO));
        } else {
            locks::write(&self.vectors).insert(id, Arc::new(RwLock::new(vec![DVec3::ZERO; self.size])));
        }
    }

    /// Opens the integration of a step: the force accumulator starts from zero.
    pub fn begin_integration(&self, _dt: f64) {
        self.with_vector_mut(VecId::Force, |force| force.fill(DVec3::ZERO));
    }

    /// Closes the integration of a step: external forces only apply for the step they were set in.
    pub fn end_integration(&self, _dt: f64) {
        if self.has_vector(VecId::ExternalForce) {
            self.with_vector_mut(VecId::ExternalForce, |force| force.fill(DVec3::ZERO));
        }
    }
}
