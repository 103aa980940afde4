//! Attach point geometry.

use nalgebra::{Isometry3, Point3, Unit, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An attach point in some frame: a position and an outward direction.
///
/// Peers store their anchor in the owning body's local frame; the world
/// anchor is obtained with [`AnchorPose::to_world`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnchorPose {
    /// Attach point position.
    pub position: Point3<f64>,
    /// Outward facing direction of the attach node.
    pub direction: Unit<Vector3<f64>>,
}

impl Default for AnchorPose {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            direction: Vector3::z_axis(),
        }
    }
}

impl AnchorPose {
    /// Create an anchor. A zero direction falls back to +Z.
    #[must_use]
    pub fn new(position: Point3<f64>, direction: Vector3<f64>) -> Self {
        let direction = Unit::try_new(direction, 1e-12).unwrap_or_else(Vector3::z_axis);
        Self {
            position,
            direction,
        }
    }

    /// Transform a body-local anchor into world coordinates.
    #[must_use]
    pub fn to_world(&self, body_pose: &Isometry3<f64>) -> Self {
        Self {
            position: body_pose * self.position,
            direction: body_pose.rotation * self.direction,
        }
    }

    /// Distance between two anchors.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        nalgebra::distance(&self.position, &other.position)
    }

    /// Angle in degrees between this anchor's direction and a world vector.
    ///
    /// Returns 0 for a zero vector.
    #[must_use]
    pub fn angle_to_deg(&self, v: &Vector3<f64>) -> f64 {
        if v.norm() < 1e-12 {
            return 0.0;
        }
        self.direction.angle(v).to_degrees()
    }

    /// Misalignment in degrees from two anchors facing each other exactly.
    #[must_use]
    pub fn facing_error_deg(&self, other: &Self) -> f64 {
        self.direction.angle(&(-other.direction.into_inner())).to_degrees()
    }
}
