//! World-space bounding boxes and spatial relation predicates.
//!
//! Every tracked object carries a local extent (full box sizes along its own
//! axes).  [`BoundingBox::from_extent`] turns it into a world-space,
//! axis-aligned box by transforming the eight corners by the object's pose.
//! The predicates below compare two such boxes.
//!
//! | Predicate | Holds when |
//! |---|---|
//! | [`is_above`]  | bottom of `b1` is no lower than top of `b2` − 2ε and the footprints overlap |
//! | [`is_on_top`] | [`is_above`] and bottom of `b1` is below top of `b2` + 2ε |
//! | [`is_in`]     | bottom of `b1` lies between bottom of `b2` − ε and top of `b2` − 2ε and the footprint of `b1` is weakly inside the one of `b2` |
//!
//! [`is_in`] uses an asymmetric margin: a relation that does not hold yet
//! must fit 2ε *inside* the container footprint to start, one that already
//! holds only ends once it leaves a footprint grown by 2ε.
//!
//! # Example
//!
//! ```rust
//! use gravitas_perception::spatial::{BoundingBox, is_in, is_on_top};
//! use gravitas_types::{Pose, Vec3};
//!
//! let table = BoundingBox::from_extent(Vec3::new(1.0, 1.0, 0.1), &Pose::at(Vec3::new(0.0, 0.0, 0.05)));
//! let cube = BoundingBox::from_extent(Vec3::new(0.1, 0.1, 0.1), &Pose::at(Vec3::new(0.0, 0.0, 0.15)));
//!
//! assert!(is_on_top(&cube, &table));
//! assert!(!is_in(&cube, &table, false));
//! ```

use gravitas_types::{Pose, Vec3};

/// Base tolerance of the relation predicates (world units).
pub const EPSILON: f32 = 0.015;

// ────────────────────────────────────────────────────────────────────────────
// BoundingBox
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned box in the world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// Create a box from two opposite corners, normalised so `min ≤ max`.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// World-space box of a body with local `extent` (full sizes) at `pose`.
    pub fn from_extent(extent: Vec3, pose: &Pose) -> Self {
        let h = extent.scale(0.5);
        let mut min = Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
        let mut max = Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    let corner = pose.transform_point(Vec3::new(sx * h.x, sy * h.y, sz * h.z));
                    min = min.min(corner);
                    max = max.max(corner);
                }
            }
        }
        Self { min, max }
    }

    /// Projection onto the ground plane.
    pub fn footprint(&self) -> Footprint {
        Footprint {
            min_x: self.min.x,
            min_y: self.min.y,
            max_x: self.max.x,
            max_y: self.max.y,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Footprint
// ────────────────────────────────────────────────────────────────────────────

/// A 2-D rectangle on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Footprint {
    /// Overlapping rectangles overlap both horizontally and vertically.
    pub fn overlaps(&self, other: &Footprint) -> bool {
        range_overlap(self.min_x, self.max_x, other.min_x, other.max_x)
            && range_overlap(self.min_y, self.max_y, other.min_y, other.max_y)
    }

    /// True when `self` lies inside `outer` shrunk by `margin` on every side.
    /// A negative margin grows `outer` instead.
    pub fn weakly_within(&self, outer: &Footprint, margin: f32) -> bool {
        self.min_x >= outer.min_x + margin
            && self.min_y >= outer.min_y + margin
            && self.max_x <= outer.max_x - margin
            && self.max_y <= outer.max_y - margin
    }
}

/// Neither range is completely greater than the other.
fn range_overlap(a_min: f32, a_max: f32, b_min: f32, b_max: f32) -> bool {
    a_min <= b_max && b_min <= a_max
}

// ────────────────────────────────────────────────────────────────────────────
// Predicates
// ────────────────────────────────────────────────────────────────────────────

/// `b1` is above `b2`.
pub fn is_above(b1: &BoundingBox, b2: &BoundingBox) -> bool {
    if b1.min.z < b2.max.z - 2.0 * EPSILON {
        return false;
    }
    b1.footprint().overlaps(&b2.footprint())
}

/// `b1` rests on top of `b2`.
pub fn is_on_top(b1: &BoundingBox, b2: &BoundingBox) -> bool {
    b1.min.z < b2.max.z + 2.0 * EPSILON && is_above(b1, b2)
}

/// `b1` rests inside `b2`.  `already` tells whether the relation held on the
/// previous evaluation and selects the hysteresis margin.
pub fn is_in(b1: &BoundingBox, b2: &BoundingBox, already: bool) -> bool {
    if b1.min.z > b2.max.z - 2.0 * EPSILON {
        return false;
    }
    if b1.min.z < b2.min.z - EPSILON {
        return false;
    }
    let margin = if already { -2.0 * EPSILON } else { 2.0 * EPSILON };
    b1.footprint().weakly_within(&b2.footprint(), margin)
}
