//! Ordered observer lists for state transitions and decoupling.
//!
//! Dispatch is synchronous and happens at the point of transition, in
//! registration order. There is no global event bus: each list is owned by
//! the world that fires it.

use hashbrown::HashMap;
use sim_link_types::{AnchorRef, LinkActor, LinkState, PeerId};

/// Handle returned on registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// A peer state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Peer whose state changed.
    pub peer: PeerId,
    /// State before the transition.
    pub old: LinkState,
    /// State after the transition.
    pub new: LinkState,
    /// Who caused it.
    pub actor: LinkActor,
}

/// Callback for [`TransitionEvent`]s.
pub type TransitionCallback = Box<dyn FnMut(&TransitionEvent)>;

/// Subscribers to `on_after_transition`.
#[derive(Default)]
pub struct TransitionObservers {
    callbacks: Vec<(ObserverId, TransitionCallback)>,
    next_id: u64,
}

impl TransitionObservers {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a callback.
    pub fn subscribe(&mut self, callback: impl FnMut(&TransitionEvent) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        self.callbacks.len() != before
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Deliver an event to every subscriber in order.
    pub fn dispatch(&mut self, event: &TransitionEvent) {
        for (_, callback) in &mut self.callbacks {
            callback(event);
        }
    }
}

impl std::fmt::Debug for TransitionObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionObservers")
            .field("len", &self.callbacks.len())
            .finish()
    }
}

/// Notification sent before two coupled bodies are split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoupleEvent {
    /// Anchor the observer registered on.
    pub anchor: AnchorRef,
    /// True when the anchor is on the side that becomes independent.
    pub is_child_side: bool,
}

/// Callback for [`DecoupleEvent`]s.
pub type DecoupleCallback = Box<dyn FnMut(&DecoupleEvent)>;

/// On-decouple observers keyed by anchor.
#[derive(Default)]
pub struct DecoupleObservers {
    by_anchor: HashMap<AnchorRef, Vec<(ObserverId, DecoupleCallback)>>,
    next_id: u64,
}

impl DecoupleObservers {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback on an anchor.
    pub fn register(
        &mut self,
        anchor: AnchorRef,
        callback: impl FnMut(&DecoupleEvent) + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.by_anchor
            .entry(anchor)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let mut removed = false;
        for list in self.by_anchor.values_mut() {
            let before = list.len();
            list.retain(|(cid, _)| *cid != id);
            removed |= list.len() != before;
        }
        self.by_anchor.retain(|_, list| !list.is_empty());
        removed
    }

    /// Drop every callback registered on an anchor.
    pub fn clear_anchor(&mut self, anchor: &AnchorRef) {
        self.by_anchor.remove(anchor);
    }

    /// Number of callbacks registered on an anchor.
    #[must_use]
    pub fn count(&self, anchor: &AnchorRef) -> usize {
        self.by_anchor.get(anchor).map_or(0, Vec::len)
    }

    /// Notify the observers of one anchor.
    pub fn dispatch(&mut self, anchor: &AnchorRef, is_child_side: bool) {
        if let Some(list) = self.by_anchor.get_mut(anchor) {
            let event = DecoupleEvent {
                anchor: anchor.clone(),
                is_child_side,
            };
            for (_, callback) in list.iter_mut() {
                callback(&event);
            }
        }
    }
}

impl std::fmt::Debug for DecoupleObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoupleObservers")
            .field("anchors", &self.by_anchor.len())
            .finish()
    }
}
