//! Vessel identity and bracing types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ids::BodyId;

/// Broad category of a vessel, used for naming and UI filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VesselKind {
    /// A controllable ship.
    #[default]
    Ship,
    /// A fixed or landed base.
    Base,
    /// A probe or drone.
    Probe,
    /// A detached fragment with regenerated identity.
    Debris,
}

/// Naming and identity snapshot of a vessel.
///
/// Captured when two vessels are coupled so the original identity of each
/// side can be restored when they are split again.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VesselInfo {
    /// Display name.
    pub name: String,
    /// Vessel category.
    pub kind: VesselKind,
    /// Root body of the vessel when the snapshot was taken.
    pub root: BodyId,
}

impl VesselInfo {
    /// Create a vessel info snapshot.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: VesselKind, root: BodyId) -> Self {
        Self {
            name: name.into(),
            kind,
            root,
        }
    }

    /// The fallback identity for a piece split off without a snapshot.
    ///
    /// The name is derived from the new root body's name; never empty.
    #[must_use]
    pub fn debris(root_name: &str, root: BodyId) -> Self {
        let base = if root_name.is_empty() {
            root.to_string()
        } else {
            root_name.to_string()
        };
        Self {
            name: format!("{base} Debris"),
            kind: VesselKind::Debris,
            root,
        }
    }
}

/// Automatic bracing target for a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AutoStrutMode {
    /// No automatic strut.
    #[default]
    Off,
    /// Strut to the vessel root.
    Root,
    /// Strut to the heaviest body of the vessel.
    Heaviest,
}
