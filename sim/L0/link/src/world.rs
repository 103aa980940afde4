//! The link world: arena owner and frame scheduler.
//!
//! [`LinkWorld`] owns the vessel tree, every peer and link, the observer
//! lists and the external collaborators. All mutation goes through
//! `&mut LinkWorld`, so a transition or a coupling is always applied as one
//! indivisible step.
//!
//! # Tick Order
//!
//! ```text
//! sample_input → step winches → follow links → end_tick (deferred actions) → audit
//! ```

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use sim_link_types::{
    AnchorPose, AnchorRef, BodyId, Isometry3, LinkActor, LinkError, LinkState, PeerConfig, PeerId,
    Result, VesselId, VesselInfo,
};

use crate::collab::{
    AudioCue, AudioSink, GeometryProbe, LinkEventKind, LinkRenderer, NoOpRenderer, OpenSpace,
    SilentAudio,
};
use crate::interactive::{InputSample, InteractiveSession, PendingAction};
use crate::joint::Joint;
use crate::observer::{
    DecoupleEvent, DecoupleObservers, ObserverId, TransitionEvent, TransitionObservers,
};
use crate::peer::{LinkPeer, PeerCapability};
use crate::vessel::{Coupling, DominanceHeuristic, MassDominance, VesselTree};
use crate::winch::WinchEvent;

/// An active link between one source and one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub(crate) source: PeerId,
    pub(crate) target: PeerId,
    pub(crate) actor: LinkActor,
    pub(crate) joint: Joint,
}

impl Link {
    /// Source peer.
    #[must_use]
    pub fn source(&self) -> PeerId {
        self.source
    }

    /// Target peer.
    #[must_use]
    pub fn target(&self) -> PeerId {
        self.target
    }

    /// Actor of the link's most recent transition.
    #[must_use]
    pub fn actor(&self) -> LinkActor {
        self.actor
    }

    /// The joint realising the link.
    #[must_use]
    pub fn joint(&self) -> &Joint {
        &self.joint
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Winch events keyed by source peer, in source id order.
    pub winch_events: Vec<(PeerId, WinchEvent)>,
    /// Deferred actions that were applied successfully.
    pub applied: usize,
    /// Peers degraded by the invariant audit.
    pub degraded: usize,
}

/// Arena of bodies, peers and links, plus the collaborators they talk to.
pub struct LinkWorld {
    pub(crate) tree: VesselTree,
    pub(crate) peers: HashMap<PeerId, LinkPeer>,
    pub(crate) links: HashMap<PeerId, Link>,
    pub(crate) sessions: HashMap<PeerId, InteractiveSession>,
    pub(crate) accepting: HashMap<PeerId, Vec<PeerId>>,
    pub(crate) pending: Vec<PendingAction>,
    pub(crate) transitions: TransitionObservers,
    pub(crate) decouple_observers: DecoupleObservers,
    pub(crate) renderer: Box<dyn LinkRenderer>,
    pub(crate) audio: Box<dyn AudioSink>,
    pub(crate) geometry: Box<dyn GeometryProbe>,
    pub(crate) dominance: Box<dyn DominanceHeuristic>,
    next_peer: u64,
    time: f64,
}

impl Default for LinkWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LinkWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkWorld")
            .field("bodies", &self.tree.num_bodies())
            .field("peers", &self.peers.len())
            .field("links", &self.links.len())
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

impl LinkWorld {
    /// Create an empty world with no-op collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: VesselTree::new(),
            peers: HashMap::new(),
            links: HashMap::new(),
            sessions: HashMap::new(),
            accepting: HashMap::new(),
            pending: Vec::new(),
            transitions: TransitionObservers::new(),
            decouple_observers: DecoupleObservers::new(),
            renderer: Box::new(NoOpRenderer),
            audio: Box::new(SilentAudio),
            geometry: Box::new(OpenSpace),
            dominance: Box::new(MassDominance),
            next_peer: 0,
            time: 0.0,
        }
    }

    /// Use a renderer for previews and link updates.
    #[must_use]
    pub fn with_renderer(mut self, renderer: impl LinkRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    /// Use an audio sink.
    #[must_use]
    pub fn with_audio(mut self, audio: impl AudioSink + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    /// Use a geometry probe for obstruction checks.
    #[must_use]
    pub fn with_geometry(mut self, geometry: impl GeometryProbe + 'static) -> Self {
        self.geometry = Box::new(geometry);
        self
    }

    /// Use a dominance heuristic for coupling.
    #[must_use]
    pub fn with_dominance(mut self, dominance: impl DominanceHeuristic + 'static) -> Self {
        self.dominance = Box::new(dominance);
        self
    }

    // ==================== Bodies ====================

    /// The vessel tree.
    #[must_use]
    pub fn tree(&self) -> &VesselTree {
        &self.tree
    }

    /// Add a body as its own vessel.
    pub fn add_body(&mut self, name: impl Into<String>, mass: f64, pose: Isometry3<f64>) -> BodyId {
        self.tree.add_body(name, mass, pose)
    }

    /// Structurally attach one vessel's root under another body.
    pub fn attach_body(&mut self, child: BodyId, parent: BodyId) -> Result<()> {
        self.tree.attach(child, parent)
    }

    /// Move a body.
    pub fn set_body_pose(&mut self, body: BodyId, pose: Isometry3<f64>) -> Result<()> {
        let record = self.tree.body_mut(body).ok_or(LinkError::UnknownBody(body))?;
        record.pose = pose;
        Ok(())
    }

    /// Give control focus to a body's vessel.
    pub fn focus_body(&mut self, body: BodyId) -> Result<()> {
        let vessel = self.tree.vessel_of(body)?;
        self.tree.set_focus(Some(vessel));
        Ok(())
    }

    /// Couple the vessels of two anchors using the world's dominance
    /// heuristic.
    pub fn couple(
        &mut self,
        source: &AnchorRef,
        target: &AnchorRef,
        prefer_dominant: bool,
    ) -> Result<Coupling> {
        self.tree
            .couple(source, target, prefer_dominant, self.dominance.as_ref())
    }

    /// Split two directly coupled bodies, notifying on-decouple observers.
    pub fn decouple(
        &mut self,
        a: &AnchorRef,
        b: &AnchorRef,
        info_a: Option<&VesselInfo>,
        info_b: Option<&VesselInfo>,
    ) -> Result<VesselId> {
        self.tree
            .decouple(a, b, info_a, info_b, &mut self.decouple_observers)
    }

    pub(crate) fn undo_coupling(&mut self, coupling: &Coupling) {
        if let Err(e) = self.tree.decouple(
            &coupling.parent,
            &coupling.child,
            coupling.parent_info.as_ref(),
            coupling.child_info.as_ref(),
            &mut self.decouple_observers,
        ) {
            warn!(error = %e, parent = %coupling.parent, child = %coupling.child,
                "link teardown could not decouple");
        }
    }

    /// Remove a body. Links on its peers are broken first as physics events.
    pub fn remove_body(&mut self, body: BodyId) -> Result<()> {
        if !self.tree.contains(body) {
            return Err(LinkError::UnknownBody(body));
        }
        let peers = self.peers_on(body);
        for &id in &peers {
            let state = self.peers.get(&id).map(|p| p.state);
            match state {
                Some(LinkState::Linking) => self.cancel_linking(id, LinkActor::PhysicsEvent)?,
                Some(s) if s.is_linked() => {
                    self.break_current_link(id, LinkActor::PhysicsEvent)?;
                }
                _ => {}
            }
        }
        for list in self.accepting.values_mut() {
            list.retain(|p| !peers.contains(p));
        }
        for id in peers {
            if let Some(peer) = self.peers.remove(&id) {
                self.decouple_observers.clear_anchor(&peer.anchor_ref());
            }
        }
        self.tree.remove_body(body)
    }

    // ==================== Peers ====================

    /// Add a peer to a body.
    ///
    /// Attach node names must be unique per body.
    pub fn add_peer(
        &mut self,
        body: BodyId,
        capability: PeerCapability,
        config: PeerConfig,
        anchor: AnchorPose,
    ) -> Result<PeerId> {
        config.validate()?;
        if let PeerCapability::Source { joint } = &capability {
            joint.validate()?;
        }
        if !self.tree.contains(body) {
            return Err(LinkError::UnknownBody(body));
        }
        let taken = self
            .peers
            .values()
            .any(|p| p.body() == body && p.attach_node() == config.attach_node);
        if taken {
            return Err(LinkError::invalid_config(format!(
                "attach node '{}' already has a peer on {body}",
                config.attach_node
            )));
        }
        let id = PeerId::new(self.next_peer);
        self.next_peer += 1;
        self.peers
            .insert(id, LinkPeer::new(id, body, capability, config, anchor));
        Ok(id)
    }

    /// Look up a peer.
    #[must_use]
    pub fn peer(&self, id: PeerId) -> Option<&LinkPeer> {
        self.peers.get(&id)
    }

    pub(crate) fn peer_ref(&self, id: PeerId) -> Result<&LinkPeer> {
        self.peers.get(&id).ok_or(LinkError::UnknownPeer(id))
    }

    /// State of a peer.
    pub fn state(&self, id: PeerId) -> Result<LinkState> {
        self.peer_ref(id).map(LinkPeer::state)
    }

    /// Peers on a body, in id order.
    #[must_use]
    pub fn peers_on(&self, body: BodyId) -> Vec<PeerId> {
        let mut ids: Vec<_> = self
            .peers
            .values()
            .filter(|p| p.body() == body)
            .map(LinkPeer::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn sorted_peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<_> = self.peers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// World-space anchor of a peer.
    pub fn world_anchor(&self, id: PeerId) -> Result<AnchorPose> {
        let peer = self.peer_ref(id)?;
        let body = self
            .tree
            .body(peer.body())
            .ok_or(LinkError::UnknownBody(peer.body()))?;
        Ok(peer.local_anchor().to_world(&body.pose))
    }

    // ==================== Links ====================

    /// Link owned by a source peer.
    #[must_use]
    pub fn link(&self, source: PeerId) -> Option<&Link> {
        self.links.get(&source)
    }

    /// Link a peer takes part in, from either side.
    #[must_use]
    pub fn link_of(&self, peer: PeerId) -> Option<&Link> {
        self.source_of(peer).and_then(|s| self.links.get(&s))
    }

    /// Number of active links.
    #[must_use]
    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    /// The source owning the link a peer takes part in.
    pub(crate) fn source_of(&self, peer: PeerId) -> Option<PeerId> {
        if self.links.contains_key(&peer) {
            return Some(peer);
        }
        self.peers
            .get(&peer)
            .and_then(|p| p.linked_peer)
            .filter(|other| self.links.contains_key(other))
    }

    pub(crate) fn sorted_link_sources(&self) -> Vec<PeerId> {
        let mut ids: Vec<_> = self.links.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // ==================== Observers ====================

    /// Subscribe to peer state changes.
    pub fn on_after_transition(
        &mut self,
        callback: impl FnMut(&TransitionEvent) + 'static,
    ) -> ObserverId {
        self.transitions.subscribe(callback)
    }

    /// Remove a state change subscriber.
    pub fn remove_transition_observer(&mut self, id: ObserverId) -> bool {
        self.transitions.unsubscribe(id)
    }

    /// Register an on-decouple observer on an anchor.
    pub fn register_decouple_observer(
        &mut self,
        anchor: AnchorRef,
        callback: impl FnMut(&DecoupleEvent) + 'static,
    ) -> ObserverId {
        self.decouple_observers.register(anchor, callback)
    }

    /// Remove an on-decouple observer.
    pub fn remove_decouple_observer(&mut self, id: ObserverId) -> bool {
        self.decouple_observers.unregister(id)
    }

    /// Apply state changes to several peers as one step, then notify.
    ///
    /// Observers only run after every change is written, so no partial
    /// transition is ever visible.
    pub(crate) fn transition(&mut self, changes: &[(PeerId, LinkState)], actor: LinkActor) {
        let mut events: SmallVec<[TransitionEvent; 4]> = SmallVec::new();
        for &(id, new) in changes {
            if let Some(peer) = self.peers.get_mut(&id) {
                let old = peer.state;
                peer.last_actor = Some(actor);
                if old != new {
                    peer.state = new;
                    debug!(peer = %id, %old, %new, %actor, "link state transition");
                    events.push(TransitionEvent {
                        peer: id,
                        old,
                        new,
                        actor,
                    });
                }
            }
        }
        for event in &events {
            self.transitions.dispatch(event);
        }
    }

    pub(crate) fn play(&mut self, kind: LinkEventKind, actor: LinkActor) {
        if let Some(cue) = AudioCue::for_event(kind, actor) {
            self.audio.play(cue);
        }
    }

    // ==================== Tick ====================

    /// Simulation time accumulated by [`LinkWorld::tick`].
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advance one frame without input.
    pub fn step(&mut self, dt: f64) -> TickReport {
        self.tick(dt, &InputSample::default())
    }

    /// Advance one frame.
    pub fn tick(&mut self, dt: f64, input: &InputSample) -> TickReport {
        self.sample_input(input);
        let winch_events = self.step_winches(dt);
        self.follow_links();
        let applied = self.end_tick();
        let degraded = self.audit();
        if dt.is_finite() {
            self.time += dt.max(0.0);
        }
        TickReport {
            winch_events,
            applied,
            degraded,
        }
    }

    fn step_winches(&mut self, dt: f64) -> Vec<(PeerId, WinchEvent)> {
        let mut events = Vec::new();
        for source in self.sorted_link_sources() {
            let Some(target) = self.links.get(&source).map(|l| l.target) else {
                continue;
            };
            let (Ok(a), Ok(b)) = (self.world_anchor(source), self.world_anchor(target)) else {
                continue;
            };
            let Some(cable) = self
                .links
                .get_mut(&source)
                .and_then(|l| l.joint.as_cable_mut())
            else {
                continue;
            };
            let event = cable.step(dt, &a, &b);
            if event != WinchEvent::Idle {
                events.push((source, event));
            }
        }
        for &(source, event) in &events {
            if event == WinchEvent::Locked {
                self.on_cable_locked(source);
            }
        }
        events
    }

    /// Per-tick follow update for every active link.
    fn follow_links(&mut self) {
        for source in self.sorted_link_sources() {
            let Some(target) = self.links.get(&source).map(|l| l.target) else {
                continue;
            };
            let (Ok(a), Ok(b)) = (self.world_anchor(source), self.world_anchor(target)) else {
                continue;
            };
            self.renderer.update_link(source, &a, &b);
            if let Some(cable) = self
                .links
                .get_mut(&source)
                .and_then(|l| l.joint.as_cable_mut())
            {
                cable.set_last_distance(a.distance(&b));
            }
        }
    }

    /// Check that every linked peer resolves to a counterpart that points
    /// back. Violations assert in debug builds and degrade to `Available`
    /// otherwise. Returns the number of degraded peers.
    pub fn audit(&mut self) -> usize {
        let mut broken = Vec::new();
        for id in self.sorted_peer_ids() {
            let Some(peer) = self.peers.get(&id) else {
                continue;
            };
            if peer.awaiting_restore {
                continue;
            }
            let consistent = match (peer.state.is_linked(), peer.linked_peer) {
                (true, Some(other)) => self.peers.get(&other).is_some_and(|o| {
                    o.linked_peer == Some(id)
                        && o.state.is_linked()
                        && o.link_type() == peer.link_type()
                }),
                (false, None) => true,
                _ => false,
            };
            if !consistent {
                broken.push(id);
            }
        }
        debug_assert!(broken.is_empty(), "link invariant violated for {broken:?}");
        for &id in &broken {
            warn!(peer = %id, "inconsistent link state, degrading to Available");
            self.degrade(id);
        }
        broken.len()
    }

    /// Drop a peer's link bookkeeping and return it to `Available`.
    pub(crate) fn degrade(&mut self, id: PeerId) {
        self.links.remove(&id);
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.clear_link();
            peer.awaiting_restore = false;
        }
        self.transition(&[(id, LinkState::Available)], LinkActor::PhysicsEvent);
    }
}
