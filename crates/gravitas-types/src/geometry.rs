//! Rigid-body geometry primitives shared by every Gravitas crate.
//!
//! Positions are expressed in the world frame, orientations as unit
//! quaternions in (w, x, y, z) convention.  All quantities are `f32`, which
//! matches the precision of the physics backend.
//!
//! # Example
//!
//! ```rust
//! use gravitas_types::geometry::{Quaternion, Vec3};
//! use std::f32::consts::FRAC_1_SQRT_2;
//!
//! // 90° yaw turns +X into +Y.
//! let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
//! let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
//! assert!((r.y - 1.0).abs() < 1e-5);
//! ```

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector (position, translation offset or velocity).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    /// Euclidean length.
    pub fn norm(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance between two points.
    pub fn distance(self, other: Self) -> f32 {
        self.sub(other).norm()
    }

    /// Component-wise min.
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise max.
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// True when every component differs from `other` by at most `tol`.
    pub fn abs_diff_le(self, other: Self, tol: f32) -> bool {
        (self.x - other.x).abs() <= tol
            && (self.y - other.y).abs() <= tol
            && (self.z - other.z).abs() <= tol
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion; use [`normalized`][Self::normalized] on raw sensor data.
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation.
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Return a unit-length copy.  A degenerate (zero) quaternion maps to the
    /// identity.
    pub fn normalized(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if n <= f32::EPSILON {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// True when every component differs from `other` by at most `tol`.
    pub fn abs_diff_le(self, other: Self, tol: f32) -> bool {
        (self.w - other.w).abs() <= tol
            && (self.x - other.x).abs() <= tol
            && (self.y - other.y).abs() <= tol
            && (self.z - other.z).abs() <= tol
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pose / Twist
// ────────────────────────────────────────────────────────────────────────────

/// Position and orientation of a rigid body in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl Pose {
    pub const fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// A pose at `position` with identity orientation.
    pub const fn at(position: Vec3) -> Self {
        Self::new(position, Quaternion::identity())
    }

    /// Map a point expressed in the body frame into the world frame.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position.add(self.orientation.rotate(local))
    }

    /// Same orientation, position shifted by `offset`.
    pub fn translated(self, offset: Vec3) -> Self {
        Self::new(self.position.add(offset), self.orientation)
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Twist {
    pub const fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }

    /// A body at rest.
    pub const fn zero() -> Self {
        Self::new(Vec3::zero(), Vec3::zero())
    }
}

/// Pose together with velocity: what perception reports and what the
/// simulator stores per body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KinematicState {
    pub pose: Pose,
    #[serde(default)]
    pub twist: Twist,
}

impl KinematicState {
    pub const fn new(pose: Pose, twist: Twist) -> Self {
        Self { pose, twist }
    }

    /// A body at rest at `pose`.
    pub const fn at_rest(pose: Pose) -> Self {
        Self::new(pose, Twist::zero())
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_1_SQRT_2;

    #[test]
    fn quaternion_identity_rotate_is_noop() {
        let r = Quaternion::identity().rotate(Vec3::new(1.0, 2.0, 3.0));
        assert!(r.abs_diff_le(Vec3::new(1.0, 2.0, 3.0), 1e-5));
    }

    #[test]
    fn quaternion_90deg_yaw_rotates_x_to_y() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let r = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert!(r.x.abs() < 1e-5, "x should be ~0, got {}", r.x);
        assert!((r.y - 1.0).abs() < 1e-5, "y should be ~1, got {}", r.y);
        assert!(r.z.abs() < 1e-5);
    }

    #[test]
    fn quaternion_conjugate_is_inverse() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let prod = q.mul(q.conjugate());
        assert!(prod.abs_diff_le(Quaternion::identity(), 1e-5));
    }

    #[test]
    fn normalized_degenerate_is_identity() {
        let q = Quaternion::new(0.0, 0.0, 0.0, 0.0).normalized();
        assert_eq!(q, Quaternion::identity());

        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0).normalized();
        assert!((q.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn abs_diff_le_is_componentwise() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        assert!(a.abs_diff_le(Vec3::new(0.01, -0.01, 0.0), 0.01));
        assert!(!a.abs_diff_le(Vec3::new(0.0, 0.0, 0.011), 0.01));
    }

    #[test]
    fn pose_transform_point_applies_rotation_then_translation() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let pose = Pose::new(Vec3::new(1.0, 0.0, 0.0), q);
        let p = pose.transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.abs_diff_le(Vec3::new(1.0, 1.0, 0.0), 1e-5), "{p:?}");
    }

    #[test]
    fn translated_keeps_orientation() {
        let q = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let pose = Pose::new(Vec3::zero(), q).translated(Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(pose.orientation, q);
        assert!((pose.position.y - 0.5).abs() < 1e-6);
    }
}
