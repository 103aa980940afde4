//! Shared fixtures for link integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use sim_link::{AudioCue, AudioSink, LinkWorld, PeerCapability, TransitionEvent};
use sim_link_types::{
    AnchorPose, BodyId, CableConfig, Isometry3, JointConfig, PeerConfig, PeerId, Point3, Vector3,
};

/// Two bodies facing each other along +x, each with one peer.
pub struct Pair {
    pub world: LinkWorld,
    pub a: BodyId,
    pub b: BodyId,
    pub source: PeerId,
    pub target: PeerId,
}

/// A rigid docking pair with the target body `gap` meters away.
pub fn docking_pair(gap: f64) -> Pair {
    pair(LinkWorld::new(), gap, JointConfig::default(), "dock")
}

/// A winch pair with the target body `distance` meters away.
pub fn cable_pair(distance: f64, config: CableConfig) -> Pair {
    pair(LinkWorld::new(), distance, JointConfig::Cable(config), "winch")
}

/// Build a pair inside an existing world.
pub fn pair(mut world: LinkWorld, gap: f64, joint: JointConfig, link_type: &str) -> Pair {
    let a = world.add_body("tug", 10.0, Isometry3::identity());
    let b = world.add_body("station", 100.0, Isometry3::translation(gap, 0.0, 0.0));
    let source = world
        .add_peer(
            a,
            PeerCapability::source(joint),
            PeerConfig::new(link_type, "nose"),
            AnchorPose::new(Point3::origin(), Vector3::x()),
        )
        .expect("source peer");
    let target = world
        .add_peer(
            b,
            PeerCapability::Target,
            PeerConfig::new(link_type, "port"),
            AnchorPose::new(Point3::origin(), -Vector3::x()),
        )
        .expect("target peer");
    Pair {
        world,
        a,
        b,
        source,
        target,
    }
}

/// Audio sink that records every cue.
#[derive(Clone, Default)]
pub struct RecordingAudio(pub Rc<RefCell<Vec<AudioCue>>>);

impl AudioSink for RecordingAudio {
    fn play(&mut self, cue: AudioCue) {
        self.0.borrow_mut().push(cue);
    }
}

/// Subscribe a recorder for transition events.
pub fn record_transitions(world: &mut LinkWorld) -> Rc<RefCell<Vec<TransitionEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    world.on_after_transition(move |event| sink.borrow_mut().push(*event));
    log
}
