//! Save/load and post-load peer resolution.

mod common;

use approx::assert_relative_eq;
use common::{cable_pair, docking_pair, record_transitions};
use sim_link::{LinkWorld, PeerCapability};
use sim_link_types::{
    AnchorPose, AnchorRef, BodyId, CableConfig, Isometry3, JointConfig, LinkActor, LinkError,
    LinkState, PeerConfig, PeerId, PeerRecord, Point3, Vector3,
};

fn source_cap(joint: JointConfig) -> PeerCapability {
    PeerCapability::source(joint)
}

fn facing(dir: Vector3<f64>) -> AnchorPose {
    AnchorPose::new(Point3::origin(), dir)
}

/// Reload a two-body world from saved records, passing each through the
/// host's key/value bag.
fn reload(
    gap: f64,
    joint: JointConfig,
    source: &PeerRecord,
    target: &PeerRecord,
) -> (LinkWorld, BodyId, BodyId, PeerId, PeerId) {
    let source = PeerRecord::from_bag(&source.to_bag()).expect("source bag");
    let target = PeerRecord::from_bag(&target.to_bag()).expect("target bag");

    let mut world = LinkWorld::new();
    let a = world.add_body("tug", 10.0, Isometry3::identity());
    let b = world.add_body("station", 100.0, Isometry3::translation(gap, 0.0, 0.0));
    let s = world
        .load_peer(a, source_cap(joint), PeerConfig::default(), facing(Vector3::x()), &source)
        .expect("load source");
    let t = world
        .load_peer(
            b,
            PeerCapability::Target,
            PeerConfig::default(),
            facing(-Vector3::x()),
            &target,
        )
        .expect("load target");
    (world, a, b, s, t)
}

/// An unlinked peer saves only its identity.
#[test]
fn unlinked_record() {
    let p = docking_pair(0.01);
    let record = p.world.save_peer(p.source).expect("save");
    assert_eq!(record, PeerRecord::unlinked("dock", "nose"));
}

/// A rigid link survives save and reload.
#[test]
fn rigid_link_round_trip() {
    let mut p = docking_pair(0.01);
    p.world
        .link_to_target(p.source, p.target, LinkActor::Player)
        .expect("link");
    let saved_source = p.world.save_peer(p.source).expect("save");
    let saved_target = p.world.save_peer(p.target).expect("save");
    assert_eq!(
        saved_source.linked_peer,
        Some(AnchorRef::new(p.b, "port"))
    );
    assert!(saved_source.cable.is_none());

    let (mut world, a, b, s, t) = reload(0.01, JointConfig::default(), &saved_source, &saved_target);
    assert_eq!(world.state(s).unwrap(), LinkState::Linked);
    assert_eq!(world.peer(s).unwrap().linked_peer(), None);

    let report = world.restore_links();
    assert_eq!(report.restored, vec![(s, t)]);
    assert_eq!(report.fallbacks, 0);
    assert!(report.degraded.is_empty());

    assert_eq!(world.peer(s).unwrap().linked_peer(), Some(t));
    assert_eq!(world.peer(t).unwrap().linked_peer(), Some(s));
    assert!(world.tree().same_vessel(a, b));
    assert_eq!(world.audit(), 0);

    assert!(world.break_current_link(t, LinkActor::Player).unwrap());
    assert!(!world.tree().same_vessel(a, b));
}

/// A locked cable reloads locked and docked, without replaying the lock.
#[test]
fn locked_cable_round_trip() {
    let config = CableConfig::with_max_length(10.0);
    let mut p = cable_pair(0.5, config);
    p.world
        .link_to_target(p.source, p.target, LinkActor::Player)
        .expect("link");
    p.world.set_motor(p.source, -2.0, LinkActor::Player).expect("motor");
    p.world.step(0.5);
    assert_eq!(p.world.state(p.source).unwrap(), LinkState::Locked);

    let saved_source = p.world.save_peer(p.source).expect("save");
    let saved_target = p.world.save_peer(p.target).expect("save");
    let cable = saved_source.cable.expect("cable record");
    assert!(cable.is_locked);
    assert_relative_eq!(cable.deployed_length, 0.0);
    assert!(saved_target.cable.is_none());

    let (mut world, a, b, s, t) = reload(0.5, JointConfig::Cable(config), &saved_source, &saved_target);
    let log = record_transitions(&mut world);
    world.restore_links();

    assert!(log.borrow().is_empty(), "restoring reports no transitions");
    assert_eq!(world.peer(s).unwrap().last_actor(), None);
    assert_eq!(world.state(s).unwrap(), LinkState::Locked);
    assert_eq!(world.state(t).unwrap(), LinkState::Locked);
    let joint = world.link(s).and_then(|l| l.joint().as_cable()).expect("cable");
    assert!(joint.is_locked());
    assert!(joint.is_docked());
    assert!(world.tree().same_vessel(a, b));
}

/// A paid-out cable keeps its length across reload.
#[test]
fn cable_length_round_trip() {
    let config = CableConfig::with_max_length(10.0);
    let mut p = cable_pair(2.0, config);
    p.world
        .link_to_target(p.source, p.target, LinkActor::Player)
        .expect("link");
    p.world.set_motor(p.source, 2.0, LinkActor::Player).expect("motor");
    p.world.step(1.0);

    let saved_source = p.world.save_peer(p.source).expect("save");
    let saved_target = p.world.save_peer(p.target).expect("save");
    let (mut world, _, _, s, _) = reload(2.0, JointConfig::Cable(config), &saved_source, &saved_target);
    world.restore_links();

    let joint = world.link(s).and_then(|l| l.joint().as_cable()).expect("cable");
    assert_relative_eq!(joint.deployed_length(), 4.0);
    assert!(!joint.is_locked());
    assert_eq!(world.state(s).unwrap(), LinkState::Linked);
}

/// A renamed attach node still resolves through the fallback match.
#[test]
fn fallback_resolution() {
    let mut world = LinkWorld::new();
    let a = world.add_body("tug", 10.0, Isometry3::identity());
    let b = world.add_body("station", 100.0, Isometry3::translation(0.01, 0.0, 0.0));
    let s = world
        .load_peer(
            a,
            source_cap(JointConfig::default()),
            PeerConfig::default(),
            facing(Vector3::x()),
            &PeerRecord::unlinked("dock", "nose").linked_to(AnchorRef::new(b, "legacyPort")),
        )
        .expect("source");
    let t = world
        .load_peer(
            b,
            PeerCapability::Target,
            PeerConfig::default(),
            facing(-Vector3::x()),
            &PeerRecord::unlinked("dock", "port").linked_to(AnchorRef::new(a, "oldNose")),
        )
        .expect("target");

    let resolution = world.find_link_peer(s).expect("resolve");
    assert_eq!(resolution.peer, t);
    assert!(resolution.used_fallback);

    let report = world.restore_links();
    assert_eq!(report.restored, vec![(s, t)]);
    assert_eq!(report.fallbacks, 1);

    // Both references are exact after restoring.
    assert_eq!(
        world.peer(s).unwrap().persisted_link(),
        Some(&AnchorRef::new(b, "port"))
    );
    assert_eq!(
        world.peer(t).unwrap().persisted_link(),
        Some(&AnchorRef::new(a, "nose"))
    );
    let strict = world.find_link_peer(s).expect("resolve");
    assert!(!strict.used_fallback);
}

/// Two candidates that both point back at the source body are ambiguous.
#[test]
fn ambiguous_resolution_degrades() {
    let mut world = LinkWorld::new();
    let s_body = world.add_body("tug", 10.0, Isometry3::identity());
    let t_body = world.add_body("station", 100.0, Isometry3::translation(0.01, 0.0, 0.0));
    let source = world
        .load_peer(
            s_body,
            source_cap(JointConfig::default()),
            PeerConfig::default(),
            facing(Vector3::x()),
            &PeerRecord::unlinked("dock", "a").linked_to(AnchorRef::new(t_body, "z")),
        )
        .expect("source");
    let mut targets = Vec::new();
    for (node, back) in [("x", "b"), ("y", "c")] {
        let id = world
            .load_peer(
                t_body,
                PeerCapability::Target,
                PeerConfig::default(),
                facing(-Vector3::x()),
                &PeerRecord::unlinked("dock", node).linked_to(AnchorRef::new(s_body, back)),
            )
            .expect("target");
        targets.push(id);
    }

    let err = world.find_link_peer(source).unwrap_err();
    assert_eq!(
        err,
        LinkError::AmbiguousLink {
            anchor: AnchorRef::new(s_body, "a"),
            candidates: 2
        }
    );
    assert!(err.is_resolution_failure());
    assert!(err.to_string().contains("ambiguous"));
    assert_eq!(world.peer(source).unwrap().linked_peer(), None);

    let report = world.restore_links();
    assert!(report.restored.is_empty());
    assert_eq!(report.degraded, vec![source, targets[0], targets[1]]);
    for id in [source, targets[0], targets[1]] {
        let peer = world.peer(id).unwrap();
        assert_eq!(peer.state(), LinkState::Available);
        assert_eq!(peer.persisted_link(), None);
    }
    assert_eq!(world.audit(), 0);
}

/// A counterpart on a body that no longer exists leaves the peer available.
#[test]
fn missing_target_body_degrades() {
    let mut world = LinkWorld::new();
    let a = world.add_body("tug", 10.0, Isometry3::identity());
    let s = world
        .load_peer(
            a,
            source_cap(JointConfig::default()),
            PeerConfig::default(),
            facing(Vector3::x()),
            &PeerRecord::unlinked("dock", "nose").linked_to(AnchorRef::new(BodyId::new(42), "port")),
        )
        .expect("source");

    assert_eq!(
        world.find_link_peer(s).unwrap_err(),
        LinkError::TargetNotFound(BodyId::new(42))
    );
    let report = world.restore_links();
    assert_eq!(report.degraded, vec![s]);
    assert_eq!(world.state(s).unwrap(), LinkState::Available);
}

/// A peer that was never linked has nothing to resolve.
#[test]
fn unlinked_peer_has_no_counterpart() {
    let p = docking_pair(0.01);
    let err = p.world.find_link_peer(p.source).unwrap_err();
    assert!(matches!(err, LinkError::MissingLink(_)));
}

/// Corrupt bags are reported, not guessed at.
#[test]
fn malformed_bag_is_rejected() {
    let mut bag = PeerRecord::unlinked("dock", "nose")
        .linked_to(AnchorRef::new(BodyId::new(1), "port"))
        .to_bag();
    bag.insert("linkedPartId".to_string(), "not-a-number".to_string());
    assert!(matches!(
        PeerRecord::from_bag(&bag),
        Err(LinkError::MalformedRecord { .. })
    ));
}
