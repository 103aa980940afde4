//! Link establishment, cancellation, teardown and winch commands.
//!
//! Every operation that changes two peers writes both states before any
//! observer runs, so `Linked` is only ever visible on both sides at once.

use tracing::{debug, info, warn};

use sim_link_types::{
    JointConfig, LinkActor, LinkError, LinkMode, LinkProblem, LinkState, PeerId, PeerRole, Result,
};

use crate::collab::LinkEventKind;
use crate::joint::{check_joint, Joint, RigidJoint};
use crate::winch::CableJoint;
use crate::world::{Link, LinkWorld};

impl LinkWorld {
    /// Put a source into `Linking`.
    ///
    /// Every `Available` target of the same link type on another body moves
    /// to `AcceptingLinks` until the attempt ends. Targets another attempt
    /// already holds are shared and stay accepting until the last holder
    /// lets go.
    pub fn start_linking(&mut self, source: PeerId, mode: LinkMode, actor: LinkActor) -> Result<()> {
        let peer = self.peer_ref(source)?;
        if peer.role() != PeerRole::Source {
            return Err(LinkError::NotASource(source));
        }
        if peer.state() != LinkState::Available {
            return Err(LinkError::InvalidState {
                peer: source,
                operation: "start linking",
                state: peer.state(),
            });
        }
        if !peer.config().supports(mode) {
            return Err(LinkError::ModeNotSupported { peer: source, mode });
        }

        let body = peer.body();
        let link_type = peer.link_type().to_owned();
        let mut targets: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| {
                p.role() == PeerRole::Target
                    && p.body() != body
                    && p.link_type() == link_type
                    && match p.state() {
                        LinkState::Available => true,
                        LinkState::AcceptingLinks => self.is_held(p.id()),
                        _ => false,
                    }
            })
            .map(|p| p.id())
            .collect();
        targets.sort_unstable();

        if let Some(p) = self.peers.get_mut(&source) {
            p.linking_mode = Some(mode);
        }
        let mut changes = vec![(source, LinkState::Linking)];
        changes.extend(
            targets
                .iter()
                .filter(|&&t| self.peers.get(&t).is_some_and(|p| p.state() == LinkState::Available))
                .map(|&t| (t, LinkState::AcceptingLinks)),
        );
        self.transition(&changes, actor);
        self.accepting.insert(source, targets);

        info!(peer = %source, ?mode, %actor, link_type = %link_type, "linking started");
        Ok(())
    }

    /// Let a target declare itself willing to accept links.
    pub fn accept_links(&mut self, target: PeerId, actor: LinkActor) -> Result<()> {
        let peer = self.peer_ref(target)?;
        if peer.role() != PeerRole::Target {
            return Err(LinkError::InvalidState {
                peer: target,
                operation: "accept links",
                state: peer.state(),
            });
        }
        match peer.state() {
            LinkState::AcceptingLinks => Ok(()),
            LinkState::Available => {
                self.transition(&[(target, LinkState::AcceptingLinks)], actor);
                Ok(())
            }
            state => Err(LinkError::InvalidState {
                peer: target,
                operation: "accept links",
                state,
            }),
        }
    }

    /// Withdraw a target's willingness to accept links. No-op unless the
    /// target is in `AcceptingLinks`.
    pub fn stop_accepting_links(&mut self, target: PeerId, actor: LinkActor) -> Result<()> {
        if self.peer_ref(target)?.state() == LinkState::AcceptingLinks {
            self.release_hold(target);
            self.transition(&[(target, LinkState::Available)], actor);
        }
        Ok(())
    }

    /// Every reason `source` cannot link to `target` right now.
    ///
    /// An empty list means the link would succeed. Errors are returned only
    /// for unknown peers.
    pub fn check_can_link(&self, source: PeerId, target: PeerId) -> Result<Vec<LinkProblem>> {
        let src = self.peer_ref(source)?;
        let tgt = self.peer_ref(target)?;
        let mut problems = Vec::new();

        if src.link_type() != tgt.link_type() {
            problems.push(LinkProblem::IncompatibleLinkType);
        }
        if tgt.role() != PeerRole::Target {
            problems.push(LinkProblem::NotATarget);
        }
        if source == target || src.body() == tgt.body() {
            problems.push(LinkProblem::SelfLink);
        }
        if !tgt.state().accepts_source() {
            problems.push(LinkProblem::TargetBusy { state: tgt.state() });
        }
        if src.is_linked() {
            problems.push(LinkProblem::SourceBusy);
        }

        let a = self.world_anchor(source)?;
        let b = self.world_anchor(target)?;
        if !self
            .geometry
            .is_path_clear(&a.position, &b.position, &[src.body(), tgt.body()])
        {
            problems.push(LinkProblem::Obstructed);
        }
        if let Some(joint) = src.joint_config() {
            let same_vessel = self.tree.same_vessel(src.body(), tgt.body());
            problems.extend(check_joint(joint, &a, &b, same_vessel));
        }
        Ok(problems)
    }

    /// Link a source to a target.
    ///
    /// From `Linking` this completes the attempt; from `Available` it is a
    /// one-shot programmatic link. On rejection every reason is returned in
    /// [`LinkError::Incompatible`] and no state changes.
    pub fn link_to_target(&mut self, source: PeerId, target: PeerId, actor: LinkActor) -> Result<()> {
        let peer = self.peer_ref(source)?;
        if peer.role() != PeerRole::Source {
            return Err(LinkError::NotASource(source));
        }
        let was_linking = match peer.state() {
            LinkState::Linking => true,
            LinkState::Available if peer.config().supports(LinkMode::Programmatic) => false,
            LinkState::Available => {
                return Err(LinkError::ModeNotSupported {
                    peer: source,
                    mode: LinkMode::Programmatic,
                })
            }
            state => {
                return Err(LinkError::InvalidState {
                    peer: source,
                    operation: "link",
                    state,
                })
            }
        };
        let joint_config = peer.joint_config().copied().unwrap_or_default();
        let source_ref = peer.anchor_ref();
        let prefer_dominant = peer.config().prefer_dominant;
        let target_ref = self.peer_ref(target)?.anchor_ref();

        let problems = self.check_can_link(source, target)?;
        if !problems.is_empty() {
            debug!(peer = %source, target = %target, reasons = problems.len(), "link refused");
            self.play(LinkEventKind::Refused, actor);
            return Err(LinkError::Incompatible(problems));
        }

        let joint = match joint_config {
            JointConfig::Rigid(config) => {
                let coupling = self.couple(&source_ref, &target_ref, prefer_dominant)?;
                Joint::Rigid(RigidJoint::new(config, Some(coupling)))
            }
            JointConfig::Cable(config) => {
                let distance = self
                    .world_anchor(source)?
                    .distance(&self.world_anchor(target)?);
                Joint::Cable(CableJoint::new(config, distance))
            }
        };

        if let Some(p) = self.peers.get_mut(&source) {
            p.linked_peer = Some(target);
            p.persisted_link = Some(target_ref.clone());
            p.linking_mode = None;
        }
        if let Some(p) = self.peers.get_mut(&target) {
            p.linked_peer = Some(source);
            p.persisted_link = Some(source_ref.clone());
        }
        self.links.insert(
            source,
            Link {
                source,
                target,
                actor,
                joint,
            },
        );

        let mut changes = vec![(source, LinkState::Linked), (target, LinkState::Linked)];
        changes.extend(self.take_accepting(source, target));
        self.release_hold(target);
        self.transition(&changes, actor);

        if was_linking {
            self.sessions.remove(&source);
            self.renderer.stop_preview();
        }
        self.play(LinkEventKind::Linked, actor);
        info!(source = %source_ref, target = %target_ref, %actor, "link established");
        Ok(())
    }

    /// Abort a linking attempt. Always succeeds; a no-op unless the source
    /// is `Linking`.
    pub fn cancel_linking(&mut self, source: PeerId, actor: LinkActor) -> Result<()> {
        if self.peer_ref(source)?.state() != LinkState::Linking {
            return Ok(());
        }
        if let Some(p) = self.peers.get_mut(&source) {
            p.linking_mode = None;
        }
        let mut changes = vec![(source, LinkState::Available)];
        changes.extend(self.take_accepting(source, source));
        self.transition(&changes, actor);

        if self.sessions.remove(&source).is_some() {
            self.renderer.stop_preview();
        }
        self.pending.retain(|a| a.source() != source);
        debug!(peer = %source, %actor, "linking cancelled");
        Ok(())
    }

    /// Revert the targets a source's attempt moved into `AcceptingLinks`,
    /// except `keep`, which the caller is transitioning itself, and targets
    /// another attempt still holds.
    fn take_accepting(&mut self, source: PeerId, keep: PeerId) -> Vec<(PeerId, LinkState)> {
        let targets = self.accepting.remove(&source).unwrap_or_default();
        targets
            .into_iter()
            .filter(|&t| {
                t != keep
                    && !self.is_held(t)
                    && self
                        .peers
                        .get(&t)
                        .is_some_and(|p| p.state() == LinkState::AcceptingLinks)
            })
            .map(|t| (t, LinkState::Available))
            .collect()
    }

    /// Whether some linking attempt holds `target` in `AcceptingLinks`.
    fn is_held(&self, target: PeerId) -> bool {
        self.accepting.values().any(|list| list.contains(&target))
    }

    fn release_hold(&mut self, target: PeerId) {
        for list in self.accepting.values_mut() {
            list.retain(|p| *p != target);
        }
    }

    /// Break the link a peer takes part in, from either side.
    ///
    /// The joint is torn down before either state changes. Returns false if
    /// the peer had no link.
    pub fn break_current_link(&mut self, peer: PeerId, actor: LinkActor) -> Result<bool> {
        self.peer_ref(peer)?;
        let Some(source) = self.source_of(peer) else {
            return Ok(false);
        };
        let Some(mut link) = self.links.remove(&source) else {
            return Ok(false);
        };
        let target = link.target;

        if let Some(cable) = link.joint.as_cable_mut() {
            cable.unlock();
        }
        if let Some(coupling) = link.joint.take_coupling() {
            self.undo_coupling(&coupling);
        }

        for id in [source, target] {
            if let Some(p) = self.peers.get_mut(&id) {
                p.clear_link();
            }
        }
        self.transition(
            &[(source, LinkState::Available), (target, LinkState::Available)],
            actor,
        );
        self.play(LinkEventKind::Broken, actor);
        info!(source = %source, target = %target, %actor, "link broken");
        Ok(true)
    }

    /// A joint was destroyed by the physics engine.
    pub fn on_joint_broken(&mut self, peer: PeerId) -> Result<bool> {
        self.break_current_link(peer, LinkActor::PhysicsEvent)
    }

    // ==================== Winch ====================

    fn cable_source(&self, peer: PeerId) -> Result<PeerId> {
        let state = self.peer_ref(peer)?.state();
        let source = self.source_of(peer).ok_or(LinkError::InvalidState {
            peer,
            operation: "drive winch",
            state,
        })?;
        match self.links.get(&source) {
            Some(link) if link.joint.is_cable() => Ok(source),
            _ => Err(LinkError::NotACable(peer)),
        }
    }

    /// Command the winch motor of a cable link.
    ///
    /// Paying out a locked cable releases the lock first, reported as done
    /// by `actor`.
    pub fn set_motor(&mut self, peer: PeerId, speed: f64, actor: LinkActor) -> Result<()> {
        let source = self.cable_source(peer)?;
        if speed.is_nan() {
            return Err(LinkError::InvalidSpeed(speed));
        }
        let locked = self
            .links
            .get(&source)
            .and_then(|l| l.joint.as_cable())
            .is_some_and(CableJoint::is_locked);
        if locked && speed > 0.0 {
            self.release_lock(source, actor);
        }
        match self.links.get_mut(&source).and_then(|l| l.joint.as_cable_mut()) {
            Some(cable) => cable.set_motor(speed),
            None => Err(LinkError::NotACable(peer)),
        }
    }

    /// Remove slack from a cable. Returns the new deployed length.
    pub fn stretch_cable(&mut self, peer: PeerId) -> Result<f64> {
        let source = self.cable_source(peer)?;
        let target = self.links.get(&source).map(Link::target).unwrap_or(source);
        let distance = self
            .world_anchor(source)?
            .distance(&self.world_anchor(target)?);
        match self.links.get_mut(&source).and_then(|l| l.joint.as_cable_mut()) {
            Some(cable) => Ok(cable.stretch(distance)),
            None => Err(LinkError::NotACable(peer)),
        }
    }

    /// Pay out the full cable, releasing any lock.
    pub fn release_cable(&mut self, peer: PeerId, actor: LinkActor) -> Result<()> {
        let source = self.cable_source(peer)?;
        self.release_lock(source, actor);
        if let Some(cable) = self.links.get_mut(&source).and_then(|l| l.joint.as_cable_mut()) {
            cable.release();
        }
        Ok(())
    }

    /// A cable retracted fully and its lock engaged.
    pub(crate) fn on_cable_locked(&mut self, source: PeerId) {
        let Some(link) = self.links.get_mut(&source) else {
            return;
        };
        link.actor = LinkActor::PhysicsEvent;
        let target = link.target;
        let couple = link
            .joint
            .as_cable()
            .is_some_and(|c| c.config().couple_on_lock);
        let (Some(src), Some(tgt)) = (self.peers.get(&source), self.peers.get(&target)) else {
            return;
        };
        let (source_ref, target_ref) = (src.anchor_ref(), tgt.anchor_ref());
        let prefer_dominant = src.config().prefer_dominant;

        if couple && !self.tree.same_vessel(source_ref.body, target_ref.body) {
            match self.couple(&source_ref, &target_ref, prefer_dominant) {
                Ok(coupling) => {
                    if let Some(cable) =
                        self.links.get_mut(&source).and_then(|l| l.joint.as_cable_mut())
                    {
                        cable.docking = Some(coupling);
                    }
                }
                Err(e) => warn!(error = %e, peer = %source, "cable lock could not dock vessels"),
            }
        }
        self.transition(
            &[(source, LinkState::Locked), (target, LinkState::Locked)],
            LinkActor::PhysicsEvent,
        );
        self.play(LinkEventKind::Locked, LinkActor::PhysicsEvent);
        info!(source = %source_ref, target = %target_ref, "cable locked");
    }

    /// Unlock a locked cable, undoing its docking. No-op if not locked.
    fn release_lock(&mut self, source: PeerId, actor: LinkActor) {
        let Some(link) = self.links.get_mut(&source) else {
            return;
        };
        let target = link.target;
        let Some(cable) = link.joint.as_cable_mut() else {
            return;
        };
        if !cable.unlock() {
            return;
        }
        let docking = cable.docking.take();
        link.actor = actor;
        if let Some(coupling) = docking {
            self.undo_coupling(&coupling);
        }
        self.transition(
            &[(source, LinkState::Linked), (target, LinkState::Linked)],
            actor,
        );
        self.play(LinkEventKind::Unlocked, actor);
        debug!(peer = %source, "cable unlocked");
    }
}
