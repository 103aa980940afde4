//! Link peers: endpoints that can take part in a link.
//!
//! A peer is plain state plus a role capability. Sources carry the joint
//! strategy they create; targets carry nothing extra. All mutation goes
//! through the world's state machine.

use sim_link_types::{
    AnchorPose, AnchorRef, BodyId, CableRecord, JointConfig, LinkActor, LinkMode, LinkState,
    PeerConfig, PeerId, PeerRole,
};

/// Role capability of a peer.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCapability {
    /// Initiates links and owns their lifecycle.
    Source {
        /// Joint created on link.
        joint: JointConfig,
    },
    /// Accepts links.
    Target,
}

impl PeerCapability {
    /// Source capability with the given joint.
    #[must_use]
    pub fn source(joint: JointConfig) -> Self {
        Self::Source { joint }
    }

    /// The role this capability grants.
    #[must_use]
    pub fn role(&self) -> PeerRole {
        match self {
            Self::Source { .. } => PeerRole::Source,
            Self::Target => PeerRole::Target,
        }
    }
}

/// A link endpoint on a body.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPeer {
    id: PeerId,
    body: BodyId,
    capability: PeerCapability,
    config: PeerConfig,
    anchor: AnchorPose,
    pub(crate) state: LinkState,
    pub(crate) linked_peer: Option<PeerId>,
    pub(crate) persisted_link: Option<AnchorRef>,
    pub(crate) linking_mode: Option<LinkMode>,
    pub(crate) last_actor: Option<LinkActor>,
    pub(crate) loaded_cable: Option<CableRecord>,
    pub(crate) awaiting_restore: bool,
}

impl LinkPeer {
    pub(crate) fn new(
        id: PeerId,
        body: BodyId,
        capability: PeerCapability,
        config: PeerConfig,
        anchor: AnchorPose,
    ) -> Self {
        Self {
            id,
            body,
            capability,
            config,
            anchor,
            state: LinkState::Available,
            linked_peer: None,
            persisted_link: None,
            linking_mode: None,
            last_actor: None,
            loaded_cable: None,
            awaiting_restore: false,
        }
    }

    /// Peer id.
    #[must_use]
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Owning body.
    #[must_use]
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Role of this peer.
    #[must_use]
    pub fn role(&self) -> PeerRole {
        self.capability.role()
    }

    /// Role capability.
    #[must_use]
    pub fn capability(&self) -> &PeerCapability {
        &self.capability
    }

    /// Joint this peer creates, if it is a source.
    #[must_use]
    pub fn joint_config(&self) -> Option<&JointConfig> {
        match &self.capability {
            PeerCapability::Source { joint } => Some(joint),
            PeerCapability::Target => None,
        }
    }

    /// Peer configuration.
    #[must_use]
    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Link category tag.
    #[must_use]
    pub fn link_type(&self) -> &str {
        &self.config.link_type
    }

    /// Attach node name.
    #[must_use]
    pub fn attach_node(&self) -> &str {
        &self.config.attach_node
    }

    /// This peer's own anchor reference.
    #[must_use]
    pub fn anchor_ref(&self) -> AnchorRef {
        AnchorRef::new(self.body, self.config.attach_node.clone())
    }

    /// Anchor in the owning body's frame.
    #[must_use]
    pub fn local_anchor(&self) -> &AnchorPose {
        &self.anchor
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the peer is in a link.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.state.is_linked()
    }

    /// Resolved counterpart.
    #[must_use]
    pub fn linked_peer(&self) -> Option<PeerId> {
        self.linked_peer
    }

    /// Persisted counterpart reference.
    #[must_use]
    pub fn persisted_link(&self) -> Option<&AnchorRef> {
        self.persisted_link.as_ref()
    }

    /// Mode of the current linking attempt.
    #[must_use]
    pub fn linking_mode(&self) -> Option<LinkMode> {
        self.linking_mode
    }

    /// Actor of the latest transition.
    #[must_use]
    pub fn last_actor(&self) -> Option<LinkActor> {
        self.last_actor
    }

    pub(crate) fn clear_link(&mut self) {
        self.linked_peer = None;
        self.persisted_link = None;
        self.loaded_cable = None;
    }
}
