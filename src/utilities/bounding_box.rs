use glam::DVec3;

/// Provides simple axis-aligned bounding box functionality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Location with the lowest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub min: DVec3,
    /// Location with the highest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub max: DVec3,
}

impl BoundingBox {
    /// Constructs a bounding box from the specified minimum and maximum.
    #[inline]
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Computes the tightest bounding box containing every point, or `None` for an empty set.
    pub fn from_points(points: &[DVec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::new(*first, *first);
        for point in rest {
            bounds.min = bounds.min.min(*point);
            bounds.max = bounds.max.max(*point);
        }
        Some(bounds)
    }

    /// Computes a bounding box which contains two other bounding boxes.
    #[inline]
    pub fn create_merged_boxes(a: Self, b: Self) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Computes the smallest signed distance from the box to the plane `dot(normal, x) = offset`.
    /// Negative values mean part of the box lies behind the plane.
    #[inline]
    pub fn min_plane_distance(&self, normal: DVec3, offset: f64) -> f64 {
        // Support point of the box in the -normal direction.
        let support = DVec3::select(normal.cmpge(DVec3::ZERO), self.min, self.max);
        normal.dot(support) - offset
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.min, self.max)
    }
}
