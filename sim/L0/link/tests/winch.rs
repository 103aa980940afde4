//! Winch-driven cable tests.
//!
//! Runs cable links through the frame loop: paying out, retracting into a
//! lock, failed locks, slack removal and release.

mod common;

use std::f64::consts::FRAC_PI_4;

use approx::assert_relative_eq;
use common::{cable_pair, pair, record_transitions, RecordingAudio, Pair};
use sim_link::{AudioCue, CableJoint, LinkWorld, WinchEvent};
use sim_link_types::{
    CableConfig, Isometry3, JointConfig, LinkActor, LinkError, LinkState, PeerId, Vector3,
};

fn cable(world: &LinkWorld, source: PeerId) -> &CableJoint {
    world
        .link(source)
        .and_then(|l| l.joint().as_cable())
        .expect("cable link")
}

fn linked_cable(distance: f64, config: CableConfig) -> Pair {
    let mut p = cable_pair(distance, config);
    p.world
        .link_to_target(p.source, p.target, LinkActor::Player)
        .expect("link");
    p
}

/// Paying out at +2 m/s for three 1 s ticks stops exactly at max length.
#[test]
fn pay_out_clamps_at_max_length() {
    let mut p = linked_cable(0.0, CableConfig::with_max_length(5.0));
    assert_relative_eq!(cable(&p.world, p.source).deployed_length(), 0.0);
    p.world.set_motor(p.source, 2.0, LinkActor::Player).expect("motor");

    let first = p.world.step(1.0);
    assert_eq!(first.winch_events, vec![(p.source, WinchEvent::Moving)]);
    assert_relative_eq!(cable(&p.world, p.source).deployed_length(), 2.0);

    p.world.step(1.0);
    assert_relative_eq!(cable(&p.world, p.source).deployed_length(), 4.0);

    let third = p.world.step(1.0);
    assert_eq!(third.winch_events, vec![(p.source, WinchEvent::ReachedMax)]);
    let c = cable(&p.world, p.source);
    assert_relative_eq!(c.deployed_length(), 5.0);
    assert!(c.motor().is_stopped());

    let idle = p.world.step(1.0);
    assert!(idle.winch_events.is_empty());
    assert_relative_eq!(cable(&p.world, p.source).deployed_length(), 5.0);
}

/// A misaligned retraction fails to lock; retracting again retries.
#[test]
fn failed_lock_is_retried() {
    let mut p = linked_cable(0.5, CableConfig::with_max_length(10.0));
    let skewed = Isometry3::new(Vector3::new(0.5, 0.0, 0.0), Vector3::z() * FRAC_PI_4);
    p.world.set_body_pose(p.b, skewed).expect("pose");

    p.world.set_motor(p.source, -1.0, LinkActor::Player).expect("motor");
    let report = p.world.step(1.0);
    assert_eq!(report.winch_events, vec![(p.source, WinchEvent::LockFailed)]);
    let c = cable(&p.world, p.source);
    assert_relative_eq!(c.deployed_length(), 0.0);
    assert!(!c.is_locked());
    assert_eq!(p.world.state(p.source).unwrap(), LinkState::Linked);

    p.world.set_motor(p.source, -1.0, LinkActor::Player).expect("retry");
    let report = p.world.step(1.0);
    assert_eq!(report.winch_events, vec![(p.source, WinchEvent::LockFailed)]);

    p.world
        .set_body_pose(p.b, Isometry3::translation(0.5, 0.0, 0.0))
        .expect("pose");
    p.world.set_motor(p.source, -1.0, LinkActor::Player).expect("retry");
    let report = p.world.step(1.0);
    assert_eq!(report.winch_events, vec![(p.source, WinchEvent::Locked)]);
    assert!(cable(&p.world, p.source).is_locked());
}

/// Locking moves both peers to `Locked` and docks the vessels.
#[test]
fn lock_docks_and_unlock_undocks() {
    let audio = RecordingAudio::default();
    let mut p = pair(
        LinkWorld::new().with_audio(audio.clone()),
        0.5,
        JointConfig::Cable(CableConfig::with_max_length(10.0)),
        "winch",
    );
    p.world
        .link_to_target(p.source, p.target, LinkActor::Player)
        .expect("link");
    p.world.set_motor(p.source, -2.0, LinkActor::Player).expect("motor");
    p.world.step(0.5);

    assert_eq!(p.world.state(p.source).unwrap(), LinkState::Locked);
    assert_eq!(p.world.state(p.target).unwrap(), LinkState::Locked);
    assert_eq!(
        p.world.peer(p.target).unwrap().last_actor(),
        Some(LinkActor::PhysicsEvent)
    );
    assert!(p.world.tree().same_vessel(p.a, p.b));
    assert!(cable(&p.world, p.source).is_docked());
    assert_eq!(audio.0.borrow().last(), Some(&AudioCue::Locked));

    // Retract and stop commands are ignored while locked.
    p.world.set_motor(p.source, -1.0, LinkActor::Player).expect("ignored");
    assert!(cable(&p.world, p.source).motor().is_stopped());

    p.world.set_motor(p.source, 1.0, LinkActor::Player).expect("pay out");
    assert_eq!(p.world.state(p.source).unwrap(), LinkState::Linked);
    assert_eq!(p.world.state(p.target).unwrap(), LinkState::Linked);
    assert!(!p.world.tree().same_vessel(p.a, p.b));
    assert!(!cable(&p.world, p.source).is_locked());
    assert_eq!(audio.0.borrow().last(), Some(&AudioCue::Unlocked));

    p.world.step(0.5);
    assert!(cable(&p.world, p.source).deployed_length() > 0.0);
}

/// Cables that do not couple on lock leave the vessels apart.
#[test]
fn lock_without_coupling() {
    let mut p = linked_cable(
        0.5,
        CableConfig::with_max_length(10.0).couple_on_lock(false),
    );
    p.world.set_motor(p.source, -2.0, LinkActor::Player).expect("motor");
    p.world.step(0.5);
    assert_eq!(p.world.state(p.source).unwrap(), LinkState::Locked);
    assert!(!p.world.tree().same_vessel(p.a, p.b));
}

/// Length stays within bounds under an arbitrary command sequence, and a
/// locked cable always has zero length.
#[test]
fn deployed_length_stays_in_bounds() {
    let max = 4.0;
    let mut p = linked_cable(1.0, CableConfig::with_max_length(max).motor(3.0, 5.0));
    let commands = [2.5, 2.5, -1.0, 3.0, 3.0, 3.0, -3.0, -3.0, -3.0, 0.0, 1.0, -2.0];

    for (i, &speed) in commands.iter().cycle().take(60).enumerate() {
        p.world.set_motor(p.source, speed, LinkActor::Player).expect("motor");
        p.world.step(0.1 + (i % 5) as f64 * 0.2);
        let c = cable(&p.world, p.source);
        assert!(
            (0.0..=max).contains(&c.deployed_length()),
            "tick {i}: length {} out of bounds",
            c.deployed_length()
        );
        if c.is_locked() {
            assert_relative_eq!(c.deployed_length(), 0.0);
        }
        assert!(c.motor().current_speed().abs() <= 3.0 + 1e-9);
    }
}

/// Removing slack twice gives the same length.
#[test]
fn stretch_is_idempotent() {
    let mut p = linked_cable(3.0, CableConfig::with_max_length(10.0));
    p.world.set_motor(p.source, 2.0, LinkActor::Player).expect("motor");
    p.world.step(1.0);
    assert_relative_eq!(cable(&p.world, p.source).deployed_length(), 5.0);

    let once = p.world.stretch_cable(p.target).expect("stretch");
    let twice = p.world.stretch_cable(p.source).expect("stretch");
    assert_relative_eq!(once, 3.0);
    assert_relative_eq!(once, twice);
    assert!(cable(&p.world, p.source).is_taut());
}

/// Release pays out the whole cable and drops a lock.
#[test]
fn release_cable_from_lock() {
    let mut p = linked_cable(0.5, CableConfig::with_max_length(8.0));
    p.world.set_motor(p.source, -2.0, LinkActor::Player).expect("motor");
    p.world.step(0.5);
    assert_eq!(p.world.state(p.source).unwrap(), LinkState::Locked);

    p.world.release_cable(p.source, LinkActor::Player).expect("release");
    let c = cable(&p.world, p.source);
    assert!(!c.is_locked());
    assert_relative_eq!(c.deployed_length(), 8.0);
    assert_eq!(p.world.state(p.source).unwrap(), LinkState::Linked);
    assert!(!p.world.tree().same_vessel(p.a, p.b));
}

/// Breaking a locked cable tears down the docking first.
#[test]
fn break_locked_cable() {
    let mut p = linked_cable(0.5, CableConfig::with_max_length(8.0));
    p.world.set_motor(p.source, -2.0, LinkActor::Player).expect("motor");
    p.world.step(0.5);
    assert!(p.world.tree().same_vessel(p.a, p.b));

    assert!(p.world.break_current_link(p.source, LinkActor::Player).unwrap());
    assert_eq!(p.world.state(p.source).unwrap(), LinkState::Available);
    assert_eq!(p.world.state(p.target).unwrap(), LinkState::Available);
    assert!(!p.world.tree().same_vessel(p.a, p.b));
}

/// Motor commands validate their input.
#[test]
fn motor_rejects_nan() {
    let mut p = linked_cable(1.0, CableConfig::default());
    let err = p.world.set_motor(p.source, f64::NAN, LinkActor::Player).unwrap_err();
    assert!(matches!(err, LinkError::InvalidSpeed(_)));
}

/// The frame loop records the live anchor distance.
#[test]
fn follow_updates_last_distance() {
    let mut p = linked_cable(2.0, CableConfig::with_max_length(10.0));
    p.world
        .set_body_pose(p.b, Isometry3::translation(6.0, 0.0, 0.0))
        .expect("pose");
    p.world.step(0.1);
    let c = cable(&p.world, p.source);
    assert_relative_eq!(c.last_distance(), 6.0);
    assert!(c.is_taut());
}

/// A non-finite frame time leaves the cable where it was.
#[test]
fn non_finite_dt_keeps_length() {
    let mut p = linked_cable(2.0, CableConfig::with_max_length(10.0));
    p.world.set_motor(p.source, 1.0, LinkActor::Player).expect("motor");

    for dt in [f64::NAN, f64::INFINITY] {
        let report = p.world.step(dt);
        assert!(report.winch_events.is_empty());
        let length = cable(&p.world, p.source).deployed_length();
        assert!(length.is_finite());
        assert_relative_eq!(length, 2.0);
    }
    assert_relative_eq!(p.world.time(), 0.0);

    p.world.step(0.5);
    assert!(cable(&p.world, p.source).deployed_length() > 2.0);
}

/// Lock and unlock report who caused them, not who made the link.
#[test]
fn lock_transitions_carry_their_actor() {
    let mut p = linked_cable(0.5, CableConfig::with_max_length(10.0));
    assert_eq!(p.world.link(p.source).unwrap().actor(), LinkActor::Player);
    let log = record_transitions(&mut p.world);

    p.world.set_motor(p.source, -2.0, LinkActor::Player).expect("motor");
    p.world.step(0.5);
    assert_eq!(p.world.link(p.source).unwrap().actor(), LinkActor::PhysicsEvent);

    p.world
        .set_motor(p.source, 1.0, LinkActor::AutomatedAgent)
        .expect("pay out");
    assert_eq!(p.world.link(p.source).unwrap().actor(), LinkActor::AutomatedAgent);
    assert_eq!(
        p.world.peer(p.target).unwrap().last_actor(),
        Some(LinkActor::AutomatedAgent)
    );

    let events = log.borrow();
    let actors: Vec<_> = events.iter().map(|e| (e.new, e.actor)).collect();
    assert_eq!(
        actors,
        vec![
            (LinkState::Locked, LinkActor::PhysicsEvent),
            (LinkState::Locked, LinkActor::PhysicsEvent),
            (LinkState::Linked, LinkActor::AutomatedAgent),
            (LinkState::Linked, LinkActor::AutomatedAgent),
        ]
    );
}

/// Releasing a locked cable is attributed to the caller.
#[test]
fn release_reports_caller() {
    let mut p = linked_cable(0.5, CableConfig::with_max_length(8.0));
    p.world.set_motor(p.source, -2.0, LinkActor::Player).expect("motor");
    p.world.step(0.5);

    p.world
        .release_cable(p.target, LinkActor::AutomatedAgent)
        .expect("release");
    assert_eq!(p.world.link(p.source).unwrap().actor(), LinkActor::AutomatedAgent);
    assert_eq!(
        p.world.peer(p.source).unwrap().last_actor(),
        Some(LinkActor::AutomatedAgent)
    );
}
