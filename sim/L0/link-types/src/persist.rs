//! Persisted link records.
//!
//! The core writes and reads back only the fields it needs to resolve a link
//! across a save/load boundary. The host's save format is opaque: a record is
//! flattened into a [`PersistBag`] of string pairs and stored verbatim.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::ids::{AnchorRef, BodyId};

const KEY_LINK_TYPE: &str = "linkType";
const KEY_ATTACH_NODE: &str = "attachNode";
const KEY_LINKED_BODY: &str = "linkedPartId";
const KEY_LINKED_NODE: &str = "linkedNode";
const KEY_CABLE_LENGTH: &str = "deployedLength";
const KEY_CABLE_LOCKED: &str = "isLocked";

/// Opaque key/value bag handed to the host's persistence layer.
pub type PersistBag = BTreeMap<String, String>;

/// Cable joint fields that survive a reload.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CableRecord {
    /// Deployed cable length in meters.
    pub deployed_length: f64,
    /// Whether the cable was locked.
    pub is_locked: bool,
}

/// Persisted state of one link peer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeerRecord {
    /// Category tag of the peer.
    pub link_type: String,
    /// Attach node name of the peer.
    pub attach_node: String,
    /// Counterpart reference; present only while linked.
    pub linked_peer: Option<AnchorRef>,
    /// Cable state; present only on a linked cable source.
    pub cable: Option<CableRecord>,
}

impl PeerRecord {
    /// Create a record for an unlinked peer.
    #[must_use]
    pub fn unlinked(link_type: impl Into<String>, attach_node: impl Into<String>) -> Self {
        Self {
            link_type: link_type.into(),
            attach_node: attach_node.into(),
            linked_peer: None,
            cable: None,
        }
    }

    /// Set the counterpart reference.
    #[must_use]
    pub fn linked_to(mut self, anchor: AnchorRef) -> Self {
        self.linked_peer = Some(anchor);
        self
    }

    /// Set the cable state.
    #[must_use]
    pub fn with_cable(mut self, deployed_length: f64, is_locked: bool) -> Self {
        self.cable = Some(CableRecord {
            deployed_length,
            is_locked,
        });
        self
    }

    /// Flatten into a key/value bag.
    #[must_use]
    pub fn to_bag(&self) -> PersistBag {
        let mut bag = PersistBag::new();
        bag.insert(KEY_LINK_TYPE.to_string(), self.link_type.clone());
        bag.insert(KEY_ATTACH_NODE.to_string(), self.attach_node.clone());
        if let Some(anchor) = &self.linked_peer {
            bag.insert(KEY_LINKED_BODY.to_string(), anchor.body.raw().to_string());
            bag.insert(KEY_LINKED_NODE.to_string(), anchor.node.clone());
        }
        if let Some(cable) = &self.cable {
            bag.insert(
                KEY_CABLE_LENGTH.to_string(),
                cable.deployed_length.to_string(),
            );
            bag.insert(KEY_CABLE_LOCKED.to_string(), cable.is_locked.to_string());
        }
        bag
    }

    /// Read a record back from a key/value bag.
    pub fn from_bag(bag: &PersistBag) -> crate::Result<Self> {
        let link_type = required(bag, KEY_LINK_TYPE)?.to_string();
        let attach_node = required(bag, KEY_ATTACH_NODE)?.to_string();

        let linked_peer = match (bag.get(KEY_LINKED_BODY), bag.get(KEY_LINKED_NODE)) {
            (Some(body), Some(node)) => {
                let raw = body
                    .parse::<u64>()
                    .map_err(|e| LinkError::malformed(KEY_LINKED_BODY, e.to_string()))?;
                Some(AnchorRef::new(BodyId::new(raw), node.clone()))
            }
            (None, None) => None,
            _ => {
                return Err(LinkError::malformed(
                    KEY_LINKED_BODY,
                    "linked body and node must be stored together",
                ))
            }
        };

        let cable = match bag.get(KEY_CABLE_LENGTH) {
            Some(length) => {
                let deployed_length = length
                    .parse::<f64>()
                    .map_err(|e| LinkError::malformed(KEY_CABLE_LENGTH, e.to_string()))?;
                let is_locked = match bag.get(KEY_CABLE_LOCKED) {
                    Some(flag) => flag
                        .parse::<bool>()
                        .map_err(|e| LinkError::malformed(KEY_CABLE_LOCKED, e.to_string()))?,
                    None => false,
                };
                Some(CableRecord {
                    deployed_length,
                    is_locked,
                })
            }
            None => None,
        };

        Ok(Self {
            link_type,
            attach_node,
            linked_peer,
            cable,
        })
    }
}

fn required<'a>(bag: &'a PersistBag, key: &str) -> crate::Result<&'a str> {
    bag.get(key)
        .map(String::as_str)
        .ok_or_else(|| LinkError::malformed(key, "missing"))
}
