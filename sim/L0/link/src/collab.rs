//! Contracts for the collaborators around the link core.
//!
//! Rendering, audio and collision queries live outside this crate. The core
//! only calls them through these traits. Every method has a no-op default, so
//! a host implements just the hooks it cares about.

use sim_link_types::{AnchorPose, BodyId, LinkActor, PeerId, Point3};

/// Draws the connecting pipe or cable and its linking preview.
pub trait LinkRenderer {
    /// Show a preview between a linking source and a candidate target.
    fn start_preview(&mut self, _from: &AnchorPose, _to: &AnchorPose) {}

    /// Hide the preview.
    fn stop_preview(&mut self) {}

    /// Color the preview by whether the candidate can be linked.
    fn set_preview_color(&mut self, _good: bool) {}

    /// Called once per tick for every active link.
    fn update_link(&mut self, _source: PeerId, _from: &AnchorPose, _to: &AnchorPose) {}
}

/// Sound effects emitted by link events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCue {
    /// A link was established.
    Plugged,
    /// A player's link attempt was refused.
    LinkRefused,
    /// A link was broken on purpose.
    Unplugged,
    /// A link was broken by physics.
    Snapped,
    /// The cable head locked into its dock.
    Locked,
    /// The cable head was released from its dock.
    Unlocked,
}

/// What happened, before the actor is taken into account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEventKind {
    /// Link established.
    Linked,
    /// Link attempt refused.
    Refused,
    /// Link broken.
    Broken,
    /// Cable locked.
    Locked,
    /// Cable unlocked.
    Unlocked,
}

impl AudioCue {
    /// Pick the cue for an event caused by `actor`, if any.
    ///
    /// Automated agents retry silently, so refusals only sound for players.
    /// Physics breaks snap; deliberate breaks unplug.
    #[must_use]
    pub fn for_event(kind: LinkEventKind, actor: LinkActor) -> Option<Self> {
        match (kind, actor) {
            (LinkEventKind::Linked, _) => Some(Self::Plugged),
            (LinkEventKind::Refused, LinkActor::Player) => Some(Self::LinkRefused),
            (LinkEventKind::Refused, _) => None,
            (LinkEventKind::Broken, LinkActor::PhysicsEvent) => Some(Self::Snapped),
            (LinkEventKind::Broken, _) => Some(Self::Unplugged),
            (LinkEventKind::Locked, _) => Some(Self::Locked),
            (LinkEventKind::Unlocked, _) => Some(Self::Unlocked),
        }
    }
}

/// Plays audio cues.
pub trait AudioSink {
    /// Play a cue.
    fn play(&mut self, _cue: AudioCue) {}
}

/// Synchronous collision queries used by the compatibility check.
pub trait GeometryProbe {
    /// Whether the straight segment between two points is free of obstacles,
    /// ignoring the listed bodies.
    fn is_path_clear(&self, _from: &Point3<f64>, _to: &Point3<f64>, _ignore: &[BodyId]) -> bool {
        true
    }
}

/// Renderer that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRenderer;

impl LinkRenderer for NoOpRenderer {}

/// Audio sink that plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {}

/// Geometry probe for empty space: every path is clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSpace;

impl GeometryProbe for OpenSpace {}
