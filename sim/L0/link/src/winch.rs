//! Winch motor and cable joint.
//!
//! # Motor Model
//!
//! The winch has a target speed, set immediately by a command, and a current
//! speed that follows it with bounded acceleration:
//!
//! ```text
//! v ← v + clamp(v_target − v, −a·dt, a·dt)
//! L ← clamp(L + v·dt, 0, L_max)
//! ```
//!
//! Positive speed pays cable out, negative speed reels it in. Hitting either
//! bound stops the motor. Reaching zero while reeling in triggers a lock
//! attempt; a failed attempt leaves the cable unlocked at zero length until
//! the next retract command.

use sim_link_types::{AnchorPose, CableConfig, LinkError};

use crate::vessel::Coupling;

/// Speed controller of a winch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinchMotor {
    target_speed: f64,
    current_speed: f64,
    max_speed: f64,
    acceleration: f64,
}

impl WinchMotor {
    /// Create a stopped motor.
    #[must_use]
    pub fn new(max_speed: f64, acceleration: f64) -> Self {
        Self {
            target_speed: 0.0,
            current_speed: 0.0,
            max_speed: max_speed.abs(),
            acceleration: acceleration.abs(),
        }
    }

    /// Set the target speed, clamped to the motor's maximum.
    ///
    /// Infinite input clamps to the maximum; NaN is rejected.
    pub fn set_target(&mut self, speed: f64) -> sim_link_types::Result<()> {
        if speed.is_nan() {
            return Err(LinkError::InvalidSpeed(speed));
        }
        self.target_speed = speed.clamp(-self.max_speed, self.max_speed);
        Ok(())
    }

    /// Move the current speed toward the target by at most `acceleration * dt`.
    pub fn advance(&mut self, dt: f64) {
        let max_delta = self.acceleration * dt.max(0.0);
        let delta = (self.target_speed - self.current_speed).clamp(-max_delta, max_delta);
        self.current_speed += delta;
    }

    /// Stop immediately.
    pub fn stop(&mut self) {
        self.target_speed = 0.0;
        self.current_speed = 0.0;
    }

    /// Commanded speed.
    #[must_use]
    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    /// Actual speed.
    #[must_use]
    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    /// Maximum speed magnitude.
    #[must_use]
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Whether the motor is idle.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.target_speed == 0.0 && self.current_speed == 0.0
    }
}

/// Outcome of one winch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinchEvent {
    /// Motor idle, nothing changed.
    Idle,
    /// Cable length changed.
    Moving,
    /// Cable reached its maximum length; motor stopped.
    ReachedMax,
    /// Cable fully retracted and locked.
    Locked,
    /// Cable fully retracted but the lock did not engage.
    LockFailed,
}

/// A winch-driven cable between two anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct CableJoint {
    config: CableConfig,
    deployed_length: f64,
    is_locked: bool,
    motor: WinchMotor,
    last_distance: f64,
    pub(crate) docking: Option<Coupling>,
}

impl CableJoint {
    /// Create an unlocked cable paid out to `deployed_length` (clamped).
    #[must_use]
    pub fn new(config: CableConfig, deployed_length: f64) -> Self {
        let deployed_length = if deployed_length.is_finite() {
            deployed_length.clamp(0.0, config.max_length)
        } else {
            config.max_length
        };
        Self {
            motor: WinchMotor::new(config.motor_max_speed, config.motor_acceleration),
            config,
            deployed_length,
            is_locked: false,
            last_distance: deployed_length,
            docking: None,
        }
    }

    /// Create a cable already locked at zero length.
    #[must_use]
    pub fn locked(config: CableConfig) -> Self {
        let mut joint = Self::new(config, 0.0);
        joint.is_locked = true;
        joint
    }

    /// Cable configuration.
    #[must_use]
    pub fn config(&self) -> &CableConfig {
        &self.config
    }

    /// Current deployed length.
    #[must_use]
    pub fn deployed_length(&self) -> f64 {
        self.deployed_length
    }

    /// Maximum length.
    #[must_use]
    pub fn max_length(&self) -> f64 {
        self.config.max_length
    }

    /// Whether the cable head is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// The winch motor.
    #[must_use]
    pub fn motor(&self) -> &WinchMotor {
        &self.motor
    }

    /// Anchor distance sampled on the latest tick.
    #[must_use]
    pub fn last_distance(&self) -> f64 {
        self.last_distance
    }

    /// Whether the anchors are at least as far apart as the deployed length.
    #[must_use]
    pub fn is_taut(&self) -> bool {
        self.last_distance >= self.deployed_length
    }

    /// Whether the lock docked the two vessels together.
    #[must_use]
    pub fn is_docked(&self) -> bool {
        self.docking.is_some()
    }

    pub(crate) fn set_last_distance(&mut self, distance: f64) {
        self.last_distance = distance;
    }

    /// Command the motor.
    ///
    /// A locked cable ignores retract and stop commands; the caller unlocks
    /// it with [`CableJoint::unlock`] before paying out.
    pub fn set_motor(&mut self, speed: f64) -> sim_link_types::Result<()> {
        if self.is_locked {
            if speed.is_nan() {
                return Err(LinkError::InvalidSpeed(speed));
            }
            return Ok(());
        }
        self.motor.set_target(speed)
    }

    /// Release the lock. Returns true if the cable was locked.
    pub fn unlock(&mut self) -> bool {
        std::mem::replace(&mut self.is_locked, false)
    }

    /// Integrate one step.
    ///
    /// `source` and `target` are the current world anchors, used for the
    /// lock alignment test when the cable reaches zero length.
    pub fn step(&mut self, dt: f64, source: &AnchorPose, target: &AnchorPose) -> WinchEvent {
        if self.is_locked || !dt.is_finite() || dt <= 0.0 {
            return WinchEvent::Idle;
        }
        if self.motor.is_stopped() {
            return WinchEvent::Idle;
        }

        self.motor.advance(dt);
        let retracting = self.motor.target_speed() < 0.0 || self.motor.current_speed() < 0.0;
        let next = self.deployed_length + self.motor.current_speed() * dt;
        self.deployed_length = next.clamp(0.0, self.config.max_length);

        if retracting && self.deployed_length <= 0.0 {
            self.deployed_length = 0.0;
            self.motor.stop();
            return if self.try_lock(source, target) {
                WinchEvent::Locked
            } else {
                WinchEvent::LockFailed
            };
        }

        if self.deployed_length >= self.config.max_length && self.motor.current_speed() > 0.0 {
            self.deployed_length = self.config.max_length;
            self.motor.stop();
            return WinchEvent::ReachedMax;
        }

        WinchEvent::Moving
    }

    fn try_lock(&mut self, source: &AnchorPose, target: &AnchorPose) -> bool {
        let error = source.facing_error_deg(target);
        if error <= self.config.lock_max_angle_deg {
            self.is_locked = true;
            true
        } else {
            tracing::debug!(
                misalignment = error,
                limit = self.config.lock_max_angle_deg,
                "cable lock did not engage"
            );
            false
        }
    }

    /// Shorten the cable to the actual anchor distance, removing slack.
    ///
    /// Never lengthens the cable. Returns the new length.
    pub fn stretch(&mut self, distance: f64) -> f64 {
        if !self.is_locked && distance.is_finite() {
            self.deployed_length = self.deployed_length.min(distance.max(0.0));
        }
        self.deployed_length
    }

    /// Pay out the full cable, unlocking if needed. Returns true if a lock
    /// was released.
    pub fn release(&mut self) -> bool {
        let was_locked = self.unlock();
        self.motor.stop();
        self.deployed_length = self.config.max_length;
        was_locked
    }
}
