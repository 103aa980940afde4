//! Link peer states, roles, actors and linking modes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// State of a link peer.
///
/// The machine cycles between [`LinkState::Available`] and
/// [`LinkState::Linked`]; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkState {
    /// Idle and eligible to start (source) or accept (target) a link.
    #[default]
    Available,
    /// Target only: a compatible source is linking and this peer is willing.
    AcceptingLinks,
    /// Source only: a link attempt is in progress, no counterpart committed.
    Linking,
    /// Link active.
    Linked,
    /// Cable sub-state of `Linked`: fully retracted and docked.
    Locked,
}

impl LinkState {
    /// Whether the peer currently participates in a link.
    #[must_use]
    pub const fn is_linked(self) -> bool {
        matches!(self, Self::Linked | Self::Locked)
    }

    /// Whether a target in this state may be picked by a source.
    #[must_use]
    pub const fn accepts_source(self) -> bool {
        matches!(self, Self::Available | Self::AcceptingLinks)
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Available => "Available",
            Self::AcceptingLinks => "AcceptingLinks",
            Self::Linking => "Linking",
            Self::Linked => "Linked",
            Self::Locked => "Locked",
        };
        f.write_str(name)
    }
}

/// Who caused a state transition.
///
/// Recorded on every transition. It selects notification paths (audio cues,
/// messages) and never changes the state machine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkActor {
    /// A human player acting through the UI.
    Player,
    /// A script, AI or other automated controller.
    AutomatedAgent,
    /// The physics engine (broken joint, destroyed body).
    PhysicsEvent,
}

impl std::fmt::Display for LinkActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::AutomatedAgent => write!(f, "agent"),
            Self::PhysicsEvent => write!(f, "physics"),
        }
    }
}

/// How a source establishes a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkMode {
    /// Mouse-driven target selection, committed at a tick boundary.
    Interactive,
    /// Direct call with a known target.
    Programmatic,
}

/// Role of a peer in a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PeerRole {
    /// Initiates and owns the link lifecycle.
    Source,
    /// Accepts links from sources.
    Target,
}
