//! Dynamic links between rigid bodies: docking ports, pipes and winch cables.
//!
//! A link joins a **source** peer to a **target** peer. Sources initiate the
//! link and own its lifecycle; targets accept it. Each peer runs a small
//! state machine:
//!
//! ```text
//!              start_linking                link_to_target
//!  Available ───────────────▶ Linking ─────────────────────▶ Linked ⇄ Locked
//!      ▲    ◀─────────────────           (both peers at once)   │
//!      │       cancel_linking                                   │
//!      └────────────────────────────────────────────────────────┘
//!                          break_current_link
//! ```
//!
//! While a source is linking, compatible targets advertise
//! `AcceptingLinks`. A link is only ever observed as `Linked` on both ends
//! together.
//!
//! # Joints
//!
//! - **Rigid**: the two vessels are coupled into one tree while linked
//! - **Cable**: a winch pays cable in and out; fully retracting it locks the
//!   anchors together and, optionally, docks the vessels
//!
//! # Frame Loop
//!
//! [`LinkWorld::tick`] samples interactive input, integrates winches,
//! updates every active link, and applies deferred actions at the end of the
//! frame.
//!
//! # Quick Start
//!
//! ```
//! use sim_link::{LinkWorld, PeerCapability};
//! use sim_link_types::{
//!     AnchorPose, Isometry3, JointConfig, LinkActor, LinkState, PeerConfig, Point3, Vector3,
//! };
//!
//! let mut world = LinkWorld::new();
//! let ship = world.add_body("ship", 10.0, Isometry3::identity());
//! let station = world.add_body("station", 100.0, Isometry3::translation(0.02, 0.0, 0.0));
//!
//! let port = world.add_peer(
//!     ship,
//!     PeerCapability::source(JointConfig::default()),
//!     PeerConfig::new("dock", "port"),
//!     AnchorPose::new(Point3::origin(), Vector3::x()),
//! )?;
//! let berth = world.add_peer(
//!     station,
//!     PeerCapability::Target,
//!     PeerConfig::new("dock", "berth"),
//!     AnchorPose::new(Point3::origin(), -Vector3::x()),
//! )?;
//!
//! world.link_to_target(port, berth, LinkActor::AutomatedAgent)?;
//! assert_eq!(world.state(port)?, LinkState::Linked);
//! assert!(world.tree().same_vessel(ship, station));
//! # Ok::<(), sim_link_types::LinkError>(())
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. Rendering, audio
//! and collision queries are reached through the traits in [`collab`].

#![doc(html_root_url = "https://docs.rs/sim-link/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::too_many_lines
)]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod collab;
pub mod interactive;
pub mod joint;
pub mod observer;
pub mod peer;
mod protocol;
pub mod resolve;
pub mod vessel;
pub mod winch;
pub mod world;

// Re-export main types at crate root
pub use collab::{
    AudioCue, AudioSink, GeometryProbe, LinkEventKind, LinkRenderer, NoOpRenderer, OpenSpace,
    SilentAudio,
};
pub use interactive::InputSample;
pub use joint::{check_joint, Joint, RigidJoint};
pub use observer::{DecoupleEvent, DecoupleObservers, ObserverId, TransitionEvent, TransitionObservers};
pub use peer::{LinkPeer, PeerCapability};
pub use resolve::{Resolution, RestoreReport};
pub use vessel::{
    BodyRecord, Coupling, DominanceHeuristic, MassDominance, Side, VesselRecord, VesselSummary,
    VesselTree,
};
pub use winch::{CableJoint, WinchEvent, WinchMotor};
pub use world::{Link, LinkWorld, TickReport};
