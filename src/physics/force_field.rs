use glam::DVec3;

/// Computes forces on the mechanical state of the node it belongs to.
pub trait IForceField: Send {
    /// Accumulates forces for positions `x` and velocities `v` into `f`.
    fn add_force(&self, x: &[DVec3], v: &[DVec3], f: &mut [DVec3]);
}

/// Applies the same force to a set of degrees of freedom, or to all of them.
#[derive(Clone, Debug)]
pub struct ConstantForceField {
    force: DVec3,
    indices: Option<Vec<usize>>,
}

impl ConstantForceField {
    /// Applies `force` to every degree of freedom.
    pub fn new(force: DVec3) -> Self {
        Self {
            force,
            indices: None,
        }
    }

    /// Applies `force` only to the listed degrees of freedom.
    pub fn on_indices(force: DVec3, indices: Vec<usize>) -> Self {
        Self {
            force,
            indices: Some(indices),
        }
    }
}

impl IForceField for ConstantForceField {
    fn add_force(&self, _x: &[DVec3], _v: &[DVec3], f: &mut [DVec3]) {
        match &self.indices {
            Some(indices) => {
                for &i in indices {
                    if let Some(fi) = f.get_mut(i) {
                        *fi += self.force;
                    }
                }
            }
            None => f.iter_mut().for_each(|fi| *fi += self.force),
        }
    }
}

/// Damped spring between two degrees of freedom of the same state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    pub a: usize,
    pub b: usize,
    pub stiffness: f64,
    pub damping: f64,
    pub rest_length: f64,
}

impl Spring {
    /// Creates a spring whose rest length is the current distance between `a` and `b`, or zero if either end is
    /// outside `x`.
    pub fn at_rest(x: &[DVec3], a: usize, b: usize, stiffness: f64, damping: f64) -> Self {
        let rest_length = x.get(a).zip(x.get(b)).map_or(0.0, |(xa, xb)| xa.distance(*xb));
        Self {
            a,
            b,
            stiffness,
            damping,
            rest_length,
        }
    }
}

/// Set of linear damped springs. Springs with an end outside the state exert no force.
#[derive(Clone, Debug, Default)]
pub struct SpringForceField {
    springs: Vec<Spring>,
}

impl SpringForceField {
    pub fn new(springs: Vec<Spring>) -> Self {
        Self { springs }
    }
}

impl IForceField for SpringForceField {
    fn add_force(&self, x: &[DVec3], v: &[DVec3], f: &mut [DVec3]) {
        let len = x.len().min(v.len()).min(f.len());
        for spring in &self.springs {
            let (a, b) = (spring.a, spring.b);
            if a >= len || b >= len {
                continue;
            }
            let delta = x[b] - x[a];
            let length = delta.length();
            if length <= f64::EPSILON {
                continue;
            }
            let direction = delta / length;
            let relative_velocity = (v[b] - v[a]).dot(direction);
            let magnitude = spring.stiffness * (length - spring.rest_length) + spring.damping * relative_velocity;
            let force = direction * magnitude;
            f[a] += force;
            f[b] -= force;
        }
    }
}
