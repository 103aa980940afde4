//! Stable identifiers for bodies, peers and vessels.
//!
//! All cross references in the link system are ids into arenas, never owning
//! pointers. This keeps parent/child and peer/counterpart back references free
//! of ownership cycles.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new id.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the raw id value.
            #[must_use]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }
    };
}

arena_id!(
    /// Unique identifier for a body (part) in the vessel tree.
    BodyId,
    "Body"
);

arena_id!(
    /// Unique identifier for a link peer.
    PeerId,
    "Peer"
);

arena_id!(
    /// Unique identifier for a vessel (one connected tree of bodies).
    VesselId,
    "Vessel"
);

/// A logical attach slot on a body: the body id plus the attach node name.
///
/// This is what gets persisted as a peer's `linked_peer` reference, and what
/// on-decouple observers are registered against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnchorRef {
    /// Owning body.
    pub body: BodyId,
    /// Attach node name on the body geometry.
    pub node: String,
}

impl AnchorRef {
    /// Create a new anchor reference.
    #[must_use]
    pub fn new(body: BodyId, node: impl Into<String>) -> Self {
        Self {
            body,
            node: node.into(),
        }
    }
}

impl std::fmt::Display for AnchorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.body, self.node)
    }
}
