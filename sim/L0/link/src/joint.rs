//! Physical realisation of a link: rigid docking or winch cable.
//!
//! Each joint kind contributes its own geometric constraints to the
//! compatibility check, and owns whatever it needs to be torn down later.

use sim_link_types::{AnchorPose, CableConfig, JointConfig, LinkProblem, RigidConfig};

use crate::vessel::Coupling;
use crate::winch::CableJoint;

/// A rigid joint. Linking couples the two vessels into one.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidJoint {
    config: RigidConfig,
    pub(crate) coupling: Option<Coupling>,
}

impl RigidJoint {
    /// Create a rigid joint from its coupling record.
    #[must_use]
    pub fn new(config: RigidConfig, coupling: Option<Coupling>) -> Self {
        Self { config, coupling }
    }

    /// Joint configuration.
    #[must_use]
    pub fn config(&self) -> &RigidConfig {
        &self.config
    }

    /// Coupling created when the link was made.
    #[must_use]
    pub fn coupling(&self) -> Option<&Coupling> {
        self.coupling.as_ref()
    }
}

/// The joint of an active link.
#[derive(Debug, Clone, PartialEq)]
pub enum Joint {
    /// Rigid docking joint.
    Rigid(RigidJoint),
    /// Winch-driven cable.
    Cable(CableJoint),
}

impl Joint {
    /// Whether this is a cable joint.
    #[must_use]
    pub fn is_cable(&self) -> bool {
        matches!(self, Self::Cable(_))
    }

    /// The cable, if this is a cable joint.
    #[must_use]
    pub fn as_cable(&self) -> Option<&CableJoint> {
        match self {
            Self::Cable(c) => Some(c),
            Self::Rigid(_) => None,
        }
    }

    /// The cable, mutably.
    pub fn as_cable_mut(&mut self) -> Option<&mut CableJoint> {
        match self {
            Self::Cable(c) => Some(c),
            Self::Rigid(_) => None,
        }
    }

    /// Coupling that must be undone when the joint is torn down.
    pub(crate) fn take_coupling(&mut self) -> Option<Coupling> {
        match self {
            Self::Rigid(r) => r.coupling.take(),
            Self::Cable(c) => c.docking.take(),
        }
    }
}

/// Joint-specific problems for linking two world anchors.
///
/// `same_vessel` tells whether both bodies already belong to one vessel.
#[must_use]
pub fn check_joint(
    config: &JointConfig,
    source: &AnchorPose,
    target: &AnchorPose,
    same_vessel: bool,
) -> Vec<LinkProblem> {
    match config {
        JointConfig::Rigid(c) => check_rigid(c, source, target, same_vessel),
        JointConfig::Cable(c) => check_cable(c, source, target),
    }
}

fn check_rigid(
    config: &RigidConfig,
    source: &AnchorPose,
    target: &AnchorPose,
    same_vessel: bool,
) -> Vec<LinkProblem> {
    let mut problems = Vec::new();
    let gap = source.distance(target);
    if gap > config.max_gap {
        problems.push(LinkProblem::TooFar {
            gap,
            max: config.max_gap,
        });
    }
    let misalignment = source.facing_error_deg(target);
    if misalignment > config.max_angle_deg {
        problems.push(LinkProblem::Misaligned {
            angle_deg: misalignment,
            max_deg: config.max_angle_deg,
        });
    }
    if same_vessel {
        problems.push(LinkProblem::SameVessel);
    }
    problems
}

fn check_cable(config: &CableConfig, source: &AnchorPose, target: &AnchorPose) -> Vec<LinkProblem> {
    let mut problems = Vec::new();
    let distance = source.distance(target);
    if distance < config.min_length {
        problems.push(LinkProblem::TooShort {
            distance,
            min: config.min_length,
        });
    }
    if distance > config.max_length {
        problems.push(LinkProblem::TooLong {
            distance,
            max: config.max_length,
        });
    }

    let along = target.position - source.position;
    let source_angle = source.angle_to_deg(&along);
    if source_angle > config.max_angle_deg {
        problems.push(LinkProblem::SourceAngle {
            angle_deg: source_angle,
            max_deg: config.max_angle_deg,
        });
    }
    let target_angle = target.angle_to_deg(&(-along));
    if target_angle > config.max_angle_deg {
        problems.push(LinkProblem::TargetAngle {
            angle_deg: target_angle,
            max_deg: config.max_angle_deg,
        });
    }
    problems
}
