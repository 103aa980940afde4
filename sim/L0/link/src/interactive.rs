//! Interactive linking driven by sampled input.
//!
//! Input is sampled at the start of a tick. Commits and cancels are queued
//! and applied at the end of the tick, so no state change happens while the
//! frame is still reading peers.

use hashbrown::HashSet;
use tracing::debug;

use sim_link_types::{Key, LinkActor, LinkMode, LinkingKeys, PeerId, Result};

use crate::world::LinkWorld;

/// Input state for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSample {
    pressed: HashSet<Key>,
    hovered: Option<PeerId>,
}

impl InputSample {
    /// An empty sample.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as pressed this tick.
    #[must_use]
    pub fn press(mut self, key: Key) -> Self {
        self.pressed.insert(key);
        self
    }

    /// Set the peer under the pointer.
    #[must_use]
    pub fn hover(mut self, peer: PeerId) -> Self {
        self.hovered = Some(peer);
        self
    }

    /// Whether a key was pressed this tick.
    #[must_use]
    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    /// Peer under the pointer.
    #[must_use]
    pub fn hovered(&self) -> Option<PeerId> {
        self.hovered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InteractiveSession {
    keys: LinkingKeys,
    actor: LinkActor,
    hovered: Option<PeerId>,
}

/// A state change deferred to the end of the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingAction {
    Link {
        source: PeerId,
        target: PeerId,
        actor: LinkActor,
    },
    Cancel {
        source: PeerId,
        actor: LinkActor,
    },
}

impl PendingAction {
    pub(crate) fn source(&self) -> PeerId {
        match *self {
            Self::Link { source, .. } | Self::Cancel { source, .. } => source,
        }
    }
}

impl LinkWorld {
    /// Start an interactive linking session on a source.
    pub fn begin_interactive(
        &mut self,
        source: PeerId,
        keys: LinkingKeys,
        actor: LinkActor,
    ) -> Result<()> {
        self.start_linking(source, LinkMode::Interactive, actor)?;
        self.sessions.insert(
            source,
            InteractiveSession {
                keys,
                actor,
                hovered: None,
            },
        );
        Ok(())
    }

    /// Whether a source has an interactive session open.
    #[must_use]
    pub fn is_interactive(&self, source: PeerId) -> bool {
        self.sessions.contains_key(&source)
    }

    /// Number of actions waiting for the end of the tick.
    #[must_use]
    pub fn pending_actions(&self) -> usize {
        self.pending.len()
    }

    /// Read one tick of input for every open session.
    ///
    /// Updates the preview and queues commits and cancels. Nothing changes
    /// state until [`LinkWorld::end_tick`].
    pub fn sample_input(&mut self, input: &InputSample) {
        let mut sources: Vec<PeerId> = self.sessions.keys().copied().collect();
        sources.sort_unstable();

        for source in sources {
            let Some(session) = self.sessions.get(&source).copied() else {
                continue;
            };
            if input.is_pressed(session.keys.cancel) {
                self.pending.push(PendingAction::Cancel {
                    source,
                    actor: session.actor,
                });
                continue;
            }

            let hovered = input.hovered().filter(|&t| t != source);
            if hovered != session.hovered {
                match hovered.map(|t| (self.world_anchor(source), self.world_anchor(t))) {
                    Some((Ok(from), Ok(to))) => self.renderer.start_preview(&from, &to),
                    _ => self.renderer.stop_preview(),
                }
                if let Some(s) = self.sessions.get_mut(&source) {
                    s.hovered = hovered;
                }
            }

            let Some(target) = hovered else {
                continue;
            };
            let good = self
                .check_can_link(source, target)
                .is_ok_and(|problems| problems.is_empty());
            self.renderer.set_preview_color(good);

            if input.is_pressed(session.keys.commit) {
                self.pending.push(PendingAction::Link {
                    source,
                    target,
                    actor: session.actor,
                });
            }
        }
    }

    /// Apply the actions queued during this tick, in queue order.
    ///
    /// A refused commit leaves the session open. Returns how many actions
    /// succeeded.
    pub fn end_tick(&mut self) -> usize {
        let mut applied = 0;
        for action in std::mem::take(&mut self.pending) {
            let result = match action {
                PendingAction::Link {
                    source,
                    target,
                    actor,
                } => self.link_to_target(source, target, actor),
                PendingAction::Cancel { source, actor } => self.cancel_linking(source, actor),
            };
            match result {
                Ok(()) => applied += 1,
                Err(e) => debug!(peer = %action.source(), error = %e, "deferred link action failed"),
            }
        }
        applied
    }
}
