use glam::DVec3;

/// Derives the degrees of freedom of a child state from those of a parent state.
///
/// Mapped states are never integrated directly: every update of the parent must be propagated with `apply` (for
/// positions) or `apply_j` (for velocities and displacements), and forces on the child flow back with `apply_jt`.
pub trait IMapping: Send {
    /// `child_x = map(parent_x)`.
    fn apply(&self, parent_x: &[DVec3], child_x: &mut [DVec3]);

    /// `child_v = J * parent_v`.
    fn apply_j(&self, parent_v: &[DVec3], child_v: &mut [DVec3]);

    /// `parent_f += J^T * child_f`.
    fn apply_jt(&self, child_f: &[DVec3], parent_f: &mut [DVec3]);

    /// Updates the geometric stiffness from the multipliers rescaled to forces on the child.
    /// Linear mappings have none.
    fn compute_geometric_stiffness(&mut self, _parent_x: &[DVec3], _child_lambda: &[DVec3]) {}
}

/// Maps each child degree of freedom to a parent one plus a constant offset.
#[derive(Clone, Debug)]
pub struct TranslationMapping {
    indices: Vec<usize>,
    offsets: Vec<DVec3>,
}

impl TranslationMapping {
    /// Child `i` follows parent `indices[i]` at `offsets[i]`. The longer of the two lists is truncated.
    ///
    /// Child degrees of freedom whose parent index is outside the parent state are left untouched.
    pub fn new(mut indices: Vec<usize>, mut offsets: Vec<DVec3>) -> Self {
        let size = indices.len().min(offsets.len());
        indices.truncate(size);
        offsets.truncate(size);
        Self { indices, offsets }
    }

    /// Gets the number of child degrees of freedom.
    pub fn size(&self) -> usize {
        self.indices.len()
    }
}

impl IMapping for TranslationMapping {
    fn apply(&self, parent_x: &[DVec3], child_x: &mut [DVec3]) {
        for ((out, &index), offset) in child_x.iter_mut().zip(&self.indices).zip(&self.offsets) {
            if let Some(parent) = parent_x.get(index) {
                *out = *parent + *offset;
            }
        }
    }

    fn apply_j(&self, parent_v: &[DVec3], child_v: &mut [DVec3]) {
        for (out, &index) in child_v.iter_mut().zip(&self.indices) {
            if let Some(parent) = parent_v.get(index) {
                *out = *parent;
            }
        }
    }

    fn apply_jt(&self, child_f: &[DVec3], parent_f: &mut [DVec3]) {
        for (f, &index) in child_f.iter().zip(&self.indices) {
            if let Some(parent) = parent_f.get_mut(index) {
                *parent += *f;
            }
        }
    }
}
