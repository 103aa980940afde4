//! Configuration for peers, joints and interactive linking.
//!
//! Configuration objects are owned by whichever peer or session needs them
//! and passed explicitly. Nothing here lives in process-wide state.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::state::LinkMode;

/// Configuration of a single link peer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeerConfig {
    /// Category tag; only peers with equal tags can link.
    pub link_type: String,
    /// Attach node name on the owning body.
    pub attach_node: String,
    /// Whether mouse-driven linking may be started on this peer.
    pub allow_interactive: bool,
    /// Whether direct programmatic linking is allowed.
    pub allow_programmatic: bool,
    /// Ask the dominance heuristic to pick the root when coupling.
    pub prefer_dominant: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            link_type: "default".to_string(),
            attach_node: "link".to_string(),
            allow_interactive: true,
            allow_programmatic: true,
            prefer_dominant: true,
        }
    }
}

impl PeerConfig {
    /// Create a peer config with the given link type and attach node.
    #[must_use]
    pub fn new(link_type: impl Into<String>, attach_node: impl Into<String>) -> Self {
        Self {
            link_type: link_type.into(),
            attach_node: attach_node.into(),
            ..Default::default()
        }
    }

    /// Only allow programmatic links (no mouse-driven linking).
    #[must_use]
    pub fn programmatic_only(mut self) -> Self {
        self.allow_interactive = false;
        self.allow_programmatic = true;
        self
    }

    /// Only allow interactive links.
    #[must_use]
    pub fn interactive_only(mut self) -> Self {
        self.allow_interactive = true;
        self.allow_programmatic = false;
        self
    }

    /// Set whether the dominant side should become root on coupling.
    #[must_use]
    pub fn prefer_dominant(mut self, prefer: bool) -> Self {
        self.prefer_dominant = prefer;
        self
    }

    /// Whether the given mode is allowed on this peer.
    #[must_use]
    pub fn supports(&self, mode: LinkMode) -> bool {
        match mode {
            LinkMode::Interactive => self.allow_interactive,
            LinkMode::Programmatic => self.allow_programmatic,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.link_type.is_empty() {
            return Err(LinkError::invalid_config("link_type cannot be empty"));
        }
        if self.attach_node.is_empty() {
            return Err(LinkError::invalid_config("attach_node cannot be empty"));
        }
        if !self.allow_interactive && !self.allow_programmatic {
            return Err(LinkError::invalid_config(
                "peer must allow at least one linking mode",
            ));
        }
        Ok(())
    }
}

/// Configuration of a rigid (docking) joint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidConfig {
    /// Maximum gap between the two anchors, in meters.
    pub max_gap: f64,
    /// Maximum deviation from face-to-face alignment, in degrees.
    pub max_angle_deg: f64,
}

impl Default for RigidConfig {
    fn default() -> Self {
        Self {
            max_gap: 0.05,
            max_angle_deg: 5.0,
        }
    }
}

impl RigidConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.max_gap.is_finite() || self.max_gap < 0.0 {
            return Err(LinkError::invalid_config(
                "max_gap must be finite and non-negative",
            ));
        }
        validate_angle(self.max_angle_deg, "max_angle_deg")
    }
}

/// Configuration of a winch-driven cable joint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CableConfig {
    /// Minimum anchor distance at link time, in meters.
    pub min_length: f64,
    /// Maximum deployed cable length, in meters.
    pub max_length: f64,
    /// Maximum angle between the cable and either anchor's direction, degrees.
    pub max_angle_deg: f64,
    /// Maximum motor speed magnitude, m/s.
    pub motor_max_speed: f64,
    /// Motor acceleration, m/s². Bounds how fast the current speed follows
    /// the target speed.
    pub motor_acceleration: f64,
    /// Maximum misalignment for the lock to engage, degrees.
    pub lock_max_angle_deg: f64,
    /// Couple the two vessels when the cable locks.
    pub couple_on_lock: bool,
}

impl Default for CableConfig {
    fn default() -> Self {
        Self {
            min_length: 0.0,
            max_length: 50.0,
            max_angle_deg: 90.0,
            motor_max_speed: 2.0,
            motor_acceleration: 4.0,
            lock_max_angle_deg: 10.0,
            couple_on_lock: true,
        }
    }
}

impl CableConfig {
    /// Create a cable config with the given maximum length.
    #[must_use]
    pub fn with_max_length(max_length: f64) -> Self {
        Self {
            max_length,
            ..Default::default()
        }
    }

    /// Set motor limits.
    #[must_use]
    pub fn motor(mut self, max_speed: f64, acceleration: f64) -> Self {
        self.motor_max_speed = max_speed.abs();
        self.motor_acceleration = acceleration.abs();
        self
    }

    /// Set the minimum link length.
    #[must_use]
    pub fn min_length(mut self, min_length: f64) -> Self {
        self.min_length = min_length.max(0.0);
        self
    }

    /// Set the maximum cable angle at the anchors.
    #[must_use]
    pub fn max_angle(mut self, degrees: f64) -> Self {
        self.max_angle_deg = degrees;
        self
    }

    /// Set the maximum misalignment at which the lock still engages.
    #[must_use]
    pub fn lock_angle(mut self, max_angle_deg: f64) -> Self {
        self.lock_max_angle_deg = max_angle_deg;
        self
    }

    /// Set whether a successful lock couples the vessels.
    #[must_use]
    pub fn couple_on_lock(mut self, couple: bool) -> Self {
        self.couple_on_lock = couple;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.max_length.is_finite() || self.max_length <= 0.0 {
            return Err(LinkError::invalid_config(
                "max_length must be positive and finite",
            ));
        }
        if self.min_length < 0.0 || self.min_length > self.max_length {
            return Err(LinkError::invalid_config(
                "min_length must be within [0, max_length]",
            ));
        }
        if !self.motor_max_speed.is_finite() || self.motor_max_speed <= 0.0 {
            return Err(LinkError::invalid_config(
                "motor_max_speed must be positive and finite",
            ));
        }
        if !self.motor_acceleration.is_finite() || self.motor_acceleration <= 0.0 {
            return Err(LinkError::invalid_config(
                "motor_acceleration must be positive and finite",
            ));
        }
        validate_angle(self.max_angle_deg, "max_angle_deg")?;
        validate_angle(self.lock_max_angle_deg, "lock_max_angle_deg")
    }
}

fn validate_angle(degrees: f64, field: &str) -> crate::Result<()> {
    if !degrees.is_finite() || !(0.0..=180.0).contains(&degrees) {
        return Err(LinkError::invalid_config(format!(
            "{field} must be within [0, 180]"
        )));
    }
    Ok(())
}

/// Which joint a source creates once linked.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointConfig {
    /// Rigid docking joint; couples the vessels.
    Rigid(RigidConfig),
    /// Winch-driven cable.
    Cable(CableConfig),
}

impl Default for JointConfig {
    fn default() -> Self {
        Self::Rigid(RigidConfig::default())
    }
}

impl JointConfig {
    /// Whether this is a cable joint.
    #[must_use]
    pub const fn is_cable(&self) -> bool {
        matches!(self, Self::Cable(_))
    }

    /// Validate the wrapped configuration.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Rigid(c) => c.validate(),
            Self::Cable(c) => c.validate(),
        }
    }
}

/// A key or button sampled by interactive linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Key {
    /// Escape key.
    Escape,
    /// Enter/Return key.
    Enter,
    /// Primary mouse button.
    MouseLeft,
    /// Secondary mouse button.
    MouseRight,
    /// A character key.
    Char(char),
}

/// Key bindings for one interactive linking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkingKeys {
    /// Aborts the session.
    pub cancel: Key,
    /// Commits the hovered target.
    pub commit: Key,
}

impl Default for LinkingKeys {
    fn default() -> Self {
        Self {
            cancel: Key::Escape,
            commit: Key::MouseLeft,
        }
    }
}
