//! Core types for dynamic links between rigid bodies.
//!
//! This crate provides the pure data shared by the link system:
//!
//! - [`BodyId`], [`PeerId`], [`VesselId`], [`AnchorRef`] - Arena identifiers
//! - [`LinkState`], [`LinkActor`], [`LinkMode`], [`PeerRole`] - State machine vocabulary
//! - [`PeerConfig`], [`JointConfig`], [`CableConfig`], [`RigidConfig`] - Configuration
//! - [`LinkError`], [`LinkProblem`] - Errors and human readable link problems
//! - [`PeerRecord`], [`PersistBag`] - Fields persisted across save/load
//!
//! # Layer 0
//!
//! These types carry no behaviour and have **zero Bevy dependencies**. The
//! state machine, winch and vessel tree live in `sim-link`.
//!
//! # Example
//!
//! ```
//! use sim_link_types::{CableConfig, JointConfig, LinkMode, PeerConfig};
//!
//! let peer = PeerConfig::new("winch", "cableNode").programmatic_only();
//! assert!(!peer.supports(LinkMode::Interactive));
//!
//! let joint = JointConfig::Cable(CableConfig::with_max_length(25.0));
//! assert!(joint.validate().is_ok());
//! ```

#![doc(html_root_url = "https://docs.rs/sim-link-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

mod anchor;
mod config;
mod error;
mod ids;
mod persist;
mod state;
mod vessel;

pub use anchor::AnchorPose;
pub use config::{CableConfig, JointConfig, Key, LinkingKeys, PeerConfig, RigidConfig};
pub use error::{LinkError, LinkProblem};
pub use ids::{AnchorRef, BodyId, PeerId, VesselId};
pub use persist::{CableRecord, PeerRecord, PersistBag};
pub use state::{LinkActor, LinkMode, LinkState, PeerRole};
pub use vessel::{AutoStrutMode, VesselInfo, VesselKind};

// Re-export math types for convenience
pub use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;
