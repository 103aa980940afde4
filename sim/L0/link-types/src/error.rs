//! Error types for link operations.
//!
//! Every failure here is recoverable: callers get a value back and the
//! simulation tick carries on. Compatibility failures carry the full list of
//! [`LinkProblem`]s so a UI can show every blocking reason at once.

use thiserror::Error;

use crate::ids::{AnchorRef, BodyId, PeerId};
use crate::state::{LinkMode, LinkState};

/// A single reason why two peers cannot be linked.
///
/// The `Display` text is the human readable reason.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkProblem {
    /// Peers declare different link types.
    #[error("incompatible link type")]
    IncompatibleLinkType,

    /// The chosen peer is not a link target.
    #[error("peer is not a link target")]
    NotATarget,

    /// Source and target live on the same body.
    #[error("cannot link a part to itself")]
    SelfLink,

    /// The target is busy with another link or attempt.
    #[error("target is busy ({state})")]
    TargetBusy {
        /// Current state of the target.
        state: LinkState,
    },

    /// The source already holds a link.
    #[error("source is already linked")]
    SourceBusy,

    /// Something blocks the straight path between the two anchors.
    #[error("path between attach points is obstructed")]
    Obstructed,

    /// Cable anchors are closer than the minimum length.
    #[error("too short: {distance:.2} m < {min:.2} m")]
    TooShort {
        /// Anchor distance.
        distance: f64,
        /// Minimum allowed length.
        min: f64,
    },

    /// Cable anchors are farther than the maximum length.
    #[error("too long: {distance:.2} m > {max:.2} m")]
    TooLong {
        /// Anchor distance.
        distance: f64,
        /// Maximum allowed length.
        max: f64,
    },

    /// Link direction leaves the source anchor at too steep an angle.
    #[error("source angle {angle_deg:.1}° exceeds {max_deg:.1}°")]
    SourceAngle {
        /// Measured angle in degrees.
        angle_deg: f64,
        /// Allowed angle in degrees.
        max_deg: f64,
    },

    /// Link direction enters the target anchor at too steep an angle.
    #[error("target angle {angle_deg:.1}° exceeds {max_deg:.1}°")]
    TargetAngle {
        /// Measured angle in degrees.
        angle_deg: f64,
        /// Allowed angle in degrees.
        max_deg: f64,
    },

    /// Rigid anchors are too far apart to couple.
    #[error("attach points are {gap:.2} m apart (max {max:.2} m)")]
    TooFar {
        /// Gap between anchors.
        gap: f64,
        /// Maximum allowed gap.
        max: f64,
    },

    /// Rigid anchors do not face each other.
    #[error("attach points misaligned by {angle_deg:.1}° (max {max_deg:.1}°)")]
    Misaligned {
        /// Measured misalignment in degrees.
        angle_deg: f64,
        /// Allowed misalignment in degrees.
        max_deg: f64,
    },

    /// A rigid link would close a loop inside one vessel.
    #[error("parts already belong to the same vessel")]
    SameVessel,
}

/// Errors that can occur in link operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    /// No peer with this id exists.
    #[error("unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// No body with this id exists.
    #[error("unknown body: {0}")]
    UnknownBody(BodyId),

    /// Operation requires a source peer.
    #[error("{0} is not a link source")]
    NotASource(PeerId),

    /// Operation is invalid in the peer's current state.
    #[error("{peer} cannot {operation} while {state}")]
    InvalidState {
        /// Peer that rejected the request.
        peer: PeerId,
        /// Operation that was attempted.
        operation: &'static str,
        /// State the peer was in.
        state: LinkState,
    },

    /// The peer's configuration does not allow this linking mode.
    #[error("{peer} does not support {mode:?} linking")]
    ModeNotSupported {
        /// Peer that rejected the request.
        peer: PeerId,
        /// Requested mode.
        mode: LinkMode,
    },

    /// The two peers cannot be linked.
    #[error("cannot link: {}", join_problems(.0))]
    Incompatible(Vec<LinkProblem>),

    /// Operation needs a cable joint.
    #[error("{0} does not hold a cable link")]
    NotACable(PeerId),

    /// Motor input was not a number.
    #[error("invalid motor speed: {0}")]
    InvalidSpeed(f64),

    /// The persisted counterpart body does not exist.
    #[error("target not found: {0}")]
    TargetNotFound(BodyId),

    /// No linked counterpart references the peer.
    #[error("missing link for {0}")]
    MissingLink(AnchorRef),

    /// Several linked counterparts could match the peer.
    #[error("ambiguous link for {anchor}: {candidates} candidates")]
    AmbiguousLink {
        /// The anchor being resolved.
        anchor: AnchorRef,
        /// Number of candidates found.
        candidates: usize,
    },

    /// The two bodies are not in a direct parent/child relation.
    #[error("{0} and {1} are not coupled")]
    NotCoupled(BodyId, BodyId),

    /// The two bodies already belong to one vessel.
    #[error("{0} and {1} already share a vessel")]
    SameVessel(BodyId, BodyId),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A persisted record could not be read back.
    #[error("malformed record field '{field}': {reason}")]
    MalformedRecord {
        /// Offending field.
        field: String,
        /// What was wrong.
        reason: String,
    },
}

fn join_problems(problems: &[LinkProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl LinkError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a malformed record error.
    #[must_use]
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The compatibility problems, if this is a compatibility failure.
    #[must_use]
    pub fn problems(&self) -> &[LinkProblem] {
        match self {
            Self::Incompatible(problems) => problems,
            _ => &[],
        }
    }

    /// Check if this is a request rejected because of the current state.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::ModeNotSupported { .. } | Self::NotASource(_)
        )
    }

    /// Check if this is a peer resolution failure.
    #[must_use]
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::TargetNotFound(_) | Self::MissingLink(_) | Self::AmbiguousLink { .. }
        )
    }
}
