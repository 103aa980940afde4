//! Persistence and post-load peer resolution.
//!
//! A loaded peer only knows its counterpart by anchor reference. After every
//! body is loaded, [`LinkWorld::restore_links`] resolves those references
//! back to peers and rebuilds the joints. Resolution is strict first: the
//! counterpart must point back at exactly this anchor. When that fails, a
//! single linked peer of the same type on the target body pointing back at
//! this body is accepted with a warning.

use tracing::{info, warn};

use sim_link_types::{
    AnchorPose, AnchorRef, BodyId, JointConfig, LinkActor, LinkError, LinkState, PeerConfig, PeerId,
    PeerRecord, PeerRole, Result,
};

use crate::joint::{Joint, RigidJoint};
use crate::peer::PeerCapability;
use crate::vessel::Coupling;
use crate::winch::CableJoint;
use crate::world::{Link, LinkWorld};

/// A resolved counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The counterpart peer.
    pub peer: PeerId,
    /// Whether the lenient fallback match was used.
    pub used_fallback: bool,
}

/// Outcome of [`LinkWorld::restore_links`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Restored links as `(source, target)`.
    pub restored: Vec<(PeerId, PeerId)>,
    /// How many of them needed the fallback match.
    pub fallbacks: usize,
    /// Peers that could not be resolved and were returned to `Available`.
    pub degraded: Vec<PeerId>,
}

impl LinkWorld {
    /// Find the live counterpart of a peer from its persisted reference.
    pub fn find_link_peer(&self, peer: PeerId) -> Result<Resolution> {
        let me = self.peer_ref(peer)?;
        let my_ref = me.anchor_ref();
        let target = me
            .persisted_link()
            .ok_or_else(|| LinkError::MissingLink(my_ref.clone()))?;
        if !self.tree.contains(target.body) {
            return Err(LinkError::TargetNotFound(target.body));
        }

        let mut candidates: Vec<_> = self
            .peers
            .values()
            .filter(|p| {
                p.id() != peer
                    && p.body() == target.body
                    && p.is_linked()
                    && p.link_type() == me.link_type()
            })
            .collect();
        candidates.sort_unstable_by_key(|p| p.id());

        if let Some(exact) = candidates
            .iter()
            .find(|p| p.attach_node() == target.node && p.persisted_link() == Some(&my_ref))
        {
            return Ok(Resolution {
                peer: exact.id(),
                used_fallback: false,
            });
        }

        let loose: Vec<_> = candidates
            .iter()
            .filter(|p| p.persisted_link().is_some_and(|r| r.body == my_ref.body))
            .collect();
        match loose.as_slice() {
            [only] => {
                warn!(
                    peer = %my_ref,
                    expected = %target,
                    found = %only.anchor_ref(),
                    "link resolved by fallback match"
                );
                Ok(Resolution {
                    peer: only.id(),
                    used_fallback: true,
                })
            }
            [] => Err(LinkError::MissingLink(my_ref)),
            many => Err(LinkError::AmbiguousLink {
                anchor: my_ref,
                candidates: many.len(),
            }),
        }
    }

    /// Snapshot a peer for saving.
    pub fn save_peer(&self, peer: PeerId) -> Result<PeerRecord> {
        let p = self.peer_ref(peer)?;
        let mut record = PeerRecord::unlinked(p.link_type(), p.attach_node());
        if !p.is_linked() {
            return Ok(record);
        }
        if let Some(anchor) = p.persisted_link() {
            record = record.linked_to(anchor.clone());
        }
        let cable = self.links.get(&peer).and_then(|l| l.joint().as_cable());
        if let Some(cable) = cable {
            record = record.with_cable(cable.deployed_length(), cable.is_locked());
        } else if let Some(loaded) = p.loaded_cable {
            record = record.with_cable(loaded.deployed_length, loaded.is_locked);
        }
        Ok(record)
    }

    /// Recreate a peer from a saved record.
    ///
    /// The record's link type and attach node take precedence over `config`.
    /// A linked record leaves the peer `Linked` with an unresolved
    /// counterpart until [`LinkWorld::restore_links`] runs. No transition is
    /// reported for the loaded state.
    pub fn load_peer(
        &mut self,
        body: BodyId,
        capability: PeerCapability,
        config: PeerConfig,
        anchor: AnchorPose,
        record: &PeerRecord,
    ) -> Result<PeerId> {
        let config = PeerConfig {
            link_type: record.link_type.clone(),
            attach_node: record.attach_node.clone(),
            ..config
        };
        let id = self.add_peer(body, capability, config, anchor)?;
        if let (Some(linked), Some(peer)) = (&record.linked_peer, self.peers.get_mut(&id)) {
            peer.state = LinkState::Linked;
            peer.persisted_link = Some(linked.clone());
            peer.loaded_cable = record.cable;
            peer.awaiting_restore = true;
        }
        Ok(id)
    }

    /// Resolve every loaded link and rebuild its joint.
    ///
    /// Restored states are written directly; observers see no transitions.
    /// Peers whose counterpart cannot be found are returned to `Available`
    /// instead of failing the load.
    pub fn restore_links(&mut self) -> RestoreReport {
        let mut report = RestoreReport::default();
        for id in self.sorted_peer_ids() {
            let waiting = self.peers.get(&id).is_some_and(|p| p.awaiting_restore);
            if !waiting {
                continue;
            }
            match self.restore_one(id) {
                Ok((source, target, used_fallback)) => {
                    report.restored.push((source, target));
                    if used_fallback {
                        report.fallbacks += 1;
                    }
                }
                Err(e) => {
                    warn!(peer = %id, error = %e, "could not restore link, unlinking");
                    self.degrade(id);
                    report.degraded.push(id);
                }
            }
        }
        info!(
            restored = report.restored.len(),
            fallbacks = report.fallbacks,
            degraded = report.degraded.len(),
            "links restored"
        );
        report
    }

    fn restore_one(&mut self, id: PeerId) -> Result<(PeerId, PeerId, bool)> {
        let resolution = self.find_link_peer(id)?;
        let other = resolution.peer;
        let me = self.peer_ref(id)?;
        let them = self.peer_ref(other)?;
        if them.linked_peer().is_some_and(|p| p != id) {
            return Err(LinkError::InvalidState {
                peer: other,
                operation: "restore link",
                state: them.state(),
            });
        }
        let (source, target) = match (me.role(), them.role()) {
            (PeerRole::Source, PeerRole::Target) => (id, other),
            (PeerRole::Target, PeerRole::Source) => (other, id),
            _ => {
                return Err(LinkError::InvalidState {
                    peer: id,
                    operation: "restore link",
                    state: me.state(),
                })
            }
        };
        self.rebuild_link(source, target)?;
        Ok((source, target, resolution.used_fallback))
    }

    fn rebuild_link(&mut self, source: PeerId, target: PeerId) -> Result<()> {
        let src = self.peer_ref(source)?;
        let joint_config = src.joint_config().copied().unwrap_or_default();
        let cable_record = src.loaded_cable;
        let prefer_dominant = src.config().prefer_dominant;
        let source_ref = src.anchor_ref();
        let target_ref = self.peer_ref(target)?.anchor_ref();

        let (joint, state) = match joint_config {
            JointConfig::Rigid(config) => {
                let coupling = self.restore_coupling(&source_ref, &target_ref, prefer_dominant)?;
                (
                    Joint::Rigid(RigidJoint::new(config, coupling)),
                    LinkState::Linked,
                )
            }
            JointConfig::Cable(config) => match cable_record {
                Some(record) if record.is_locked => {
                    let mut cable = CableJoint::locked(config);
                    if config.couple_on_lock {
                        cable.docking =
                            self.restore_coupling(&source_ref, &target_ref, prefer_dominant)?;
                    }
                    (Joint::Cable(cable), LinkState::Locked)
                }
                Some(record) => (
                    Joint::Cable(CableJoint::new(config, record.deployed_length)),
                    LinkState::Linked,
                ),
                None => {
                    let distance = self
                        .world_anchor(source)?
                        .distance(&self.world_anchor(target)?);
                    (
                        Joint::Cable(CableJoint::new(config, distance)),
                        LinkState::Linked,
                    )
                }
            },
        };

        for (id, counterpart, anchor) in [
            (source, target, target_ref.clone()),
            (target, source, source_ref.clone()),
        ] {
            if let Some(p) = self.peers.get_mut(&id) {
                p.linked_peer = Some(counterpart);
                p.persisted_link = Some(anchor);
                p.loaded_cable = None;
                p.awaiting_restore = false;
                p.state = state;
            }
        }
        self.links.insert(
            source,
            Link {
                source,
                target,
                actor: LinkActor::AutomatedAgent,
                joint,
            },
        );
        info!(source = %source_ref, target = %target_ref, "link restored");
        Ok(())
    }

    /// Coupling record for a restored joint.
    ///
    /// Saved games store bodies already merged, so a direct parent/child
    /// relation is adopted as is. Bodies in separate vessels are coupled.
    fn restore_coupling(
        &mut self,
        source: &AnchorRef,
        target: &AnchorRef,
        prefer_dominant: bool,
    ) -> Result<Option<Coupling>> {
        if !self.tree.same_vessel(source.body, target.body) {
            return self.couple(source, target, prefer_dominant).map(Some);
        }
        let parent_of = |body: BodyId| self.tree.body(body).and_then(|b| b.parent());
        let (parent, child) = if parent_of(source.body) == Some(target.body) {
            (target, source)
        } else if parent_of(target.body) == Some(source.body) {
            (source, target)
        } else {
            return Ok(None);
        };
        Ok(Some(Coupling {
            parent: parent.clone(),
            child: child.clone(),
            root: self.tree.root_of(parent.body)?,
            parent_info: None,
            child_info: None,
        }))
    }
}
