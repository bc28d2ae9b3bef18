//! Bounding volumes used for shadow frustum fitting.
//!
//! Two shapes share one contract through [`BoundingVolume`]:
//! - [`Bounds`]: axis-aligned box (min/max corners)
//! - [`BoundingSphere`]: center + radius
//!
//! Every volume can be transformed into another reference frame, queried for
//! its axis-aligned min/max, and classified against another volume with
//! [`BoundingVolume::classify`].

use bevy::prelude::*;

/// How one volume relates to another.
///
/// `a.classify(&b)` answers "how much of `b` lies inside `a`".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    /// No overlap at all.
    Disjoint,
    /// Some of `b` is inside `a`, some is outside.
    Partial,
    /// All of `b` is inside `a`.
    Full,
}

impl Containment {
    /// True unless the volumes are disjoint.
    pub fn intersects(self) -> bool {
        self != Containment::Disjoint
    }
}

// ============================================================================
// Axis-aligned box
// ============================================================================

/// Axis-aligned bounding box.
///
/// `Bounds::EMPTY` (min = +inf, max = -inf) stands for "no geometry" and is the
/// identity for [`Bounds::union`] and [`Bounds::extend`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds {
    /// Bounds that contain nothing.
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    /// Create bounds from two corners, normalizing so that min <= max.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box enclosing all points. Empty input gives [`Bounds::EMPTY`].
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |b, p| b.extend(p))
    }

    /// True when the box contains no point at all.
    pub fn is_empty(&self) -> bool {
        !self.min.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Full extent on each axis.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Grow to include a point.
    pub fn extend(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Smallest box enclosing both boxes.
    pub fn union(self, other: Bounds) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// The eight corners, ordered by (x, y, z) bit pattern.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Box enclosing this box after an affine transform.
    ///
    /// All eight corners are transformed, so rotations produce the enclosing
    /// box of the rotated box (possibly larger than the original volume).
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self::from_points(self.corners().iter().map(|c| matrix.transform_point3(*c)))
    }

    /// True when the boxes overlap. Touching faces count as overlapping.
    pub fn intersects(&self, other: &Bounds) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.cmple(other.max).all()
            && other.min.cmple(self.max).all()
    }

    /// True when `other` lies entirely inside this box.
    pub fn contains(&self, other: &Bounds) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.cmple(other.min).all()
            && other.max.cmple(self.max).all()
    }

    /// Point of the box nearest to `point` (the point itself when inside).
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.clamp(self.min, self.max)
    }

    /// Bounding sphere around the box.
    pub fn to_sphere(&self) -> BoundingSphere {
        if self.is_empty() {
            return BoundingSphere::EMPTY;
        }
        BoundingSphere {
            center: self.center(),
            radius: self.size().length() * 0.5,
        }
    }
}

// ============================================================================
// Sphere
// ============================================================================

/// Bounding sphere. A negative radius means empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub const EMPTY: Self = Self {
        center: Vec3::ZERO,
        radius: -1.0,
    };

    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn is_empty(&self) -> bool {
        !(self.radius >= 0.0)
    }

    /// Sphere enclosing this sphere after an affine transform.
    ///
    /// Non-uniform scale inflates the radius by the largest axis scale.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let scale = matrix
            .x_axis
            .truncate()
            .length()
            .max(matrix.y_axis.truncate().length())
            .max(matrix.z_axis.truncate().length());
        Self {
            center: matrix.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }

    /// Axis-aligned box around the sphere.
    pub fn to_bounds(&self) -> Bounds {
        if self.is_empty() {
            return Bounds::EMPTY;
        }
        let r = Vec3::splat(self.radius);
        Bounds {
            min: self.center - r,
            max: self.center + r,
        }
    }
}

// ============================================================================
// Uniform volume contract
// ============================================================================

/// Which shape to use when a volume is built from a set of boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    #[default]
    Box,
    Sphere,
}

/// A bounding volume of any supported shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundingVolume {
    Box(Bounds),
    Sphere(BoundingSphere),
}

impl From<Bounds> for BoundingVolume {
    fn from(bounds: Bounds) -> Self {
        BoundingVolume::Box(bounds)
    }
}

impl From<BoundingSphere> for BoundingVolume {
    fn from(sphere: BoundingSphere) -> Self {
        BoundingVolume::Sphere(sphere)
    }
}

impl BoundingVolume {
    /// Build a volume of the requested shape around a box.
    pub fn from_bounds(bounds: Bounds, kind: VolumeKind) -> Self {
        match kind {
            VolumeKind::Box => BoundingVolume::Box(bounds),
            VolumeKind::Sphere => BoundingVolume::Sphere(bounds.to_sphere()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            BoundingVolume::Box(b) => b.is_empty(),
            BoundingVolume::Sphere(s) => s.is_empty(),
        }
    }

    /// Same-shaped volume in the frame given by `matrix`.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        match self {
            BoundingVolume::Box(b) => BoundingVolume::Box(b.transform(matrix)),
            BoundingVolume::Sphere(s) => BoundingVolume::Sphere(s.transform(matrix)),
        }
    }

    /// Axis-aligned bounds of the volume.
    pub fn bounds(&self) -> Bounds {
        match self {
            BoundingVolume::Box(b) => *b,
            BoundingVolume::Sphere(s) => s.to_bounds(),
        }
    }

    pub fn min(&self) -> Vec3 {
        self.bounds().min
    }

    pub fn max(&self) -> Vec3 {
        self.bounds().max
    }

    /// Classify how much of `other` lies inside `self`.
    ///
    /// Empty volumes are disjoint from everything.
    pub fn classify(&self, other: &BoundingVolume) -> Containment {
        if self.is_empty() || other.is_empty() {
            return Containment::Disjoint;
        }
        match (self, other) {
            (BoundingVolume::Box(a), BoundingVolume::Box(b)) => classify_box_box(a, b),
            (BoundingVolume::Box(a), BoundingVolume::Sphere(s)) => classify_box_sphere(a, s),
            (BoundingVolume::Sphere(s), BoundingVolume::Box(b)) => classify_sphere_box(s, b),
            (BoundingVolume::Sphere(a), BoundingVolume::Sphere(b)) => classify_sphere_sphere(a, b),
        }
    }
}

fn classify_box_box(outer: &Bounds, inner: &Bounds) -> Containment {
    if !outer.intersects(inner) {
        Containment::Disjoint
    } else if outer.contains(inner) {
        Containment::Full
    } else {
        Containment::Partial
    }
}

fn classify_box_sphere(outer: &Bounds, inner: &BoundingSphere) -> Containment {
    let nearest = outer.closest_point(inner.center);
    if nearest.distance_squared(inner.center) > inner.radius * inner.radius {
        Containment::Disjoint
    } else if outer.contains(&inner.to_bounds()) {
        Containment::Full
    } else {
        Containment::Partial
    }
}

fn classify_sphere_box(outer: &BoundingSphere, inner: &Bounds) -> Containment {
    let r2 = outer.radius * outer.radius;
    let nearest = inner.closest_point(outer.center);
    if nearest.distance_squared(outer.center) > r2 {
        return Containment::Disjoint;
    }
    let all_inside = inner
        .corners()
        .iter()
        .all(|c| c.distance_squared(outer.center) <= r2);
    if all_inside {
        Containment::Full
    } else {
        Containment::Partial
    }
}

fn classify_sphere_sphere(outer: &BoundingSphere, inner: &BoundingSphere) -> Containment {
    let d = outer.center.distance(inner.center);
    if d > outer.radius + inner.radius {
        Containment::Disjoint
    } else if d + inner.radius <= outer.radius {
        Containment::Full
    } else {
        Containment::Partial
    }
}
