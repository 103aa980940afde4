//! Vessel tree: the structural hierarchy of attached bodies.
//!
//! Bodies live in an arena keyed by [`BodyId`]. Each body has at most one
//! structural parent; a vessel is one connected tree with a single root.
//! Parent/child links are ids, never owning pointers.
//!
//! # Coupling
//!
//! ```text
//!   vessel P          vessel C                 merged (P dominant)
//!     p0                c0                        p0
//!     |                 |                         |
//!     p1 ◄── anchor ──► c1          ──►           p1
//!                                                 |
//!                                                 c1   (C re-rooted at c1)
//!                                                 |
//!                                                 c0
//! ```
//!
//! Decoupling reverses this and restores each side's identity snapshot,
//! including its original root, so couple-then-decouple gives back the
//! original tree shape.

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, info};

use sim_link_types::{
    AnchorRef, AutoStrutMode, BodyId, Isometry3, LinkError, Result, VesselId, VesselInfo,
    VesselKind,
};

use crate::observer::DecoupleObservers;

/// One body in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRecord {
    /// Body id.
    pub id: BodyId,
    /// Display name.
    pub name: String,
    /// Mass in kg.
    pub mass: f64,
    /// World pose.
    pub pose: Isometry3<f64>,
    /// Automatic bracing mode.
    pub auto_strut: AutoStrutMode,
    parent: Option<BodyId>,
    children: SmallVec<[BodyId; 4]>,
    vessel: VesselId,
    strut_to: Option<BodyId>,
    couplings: Vec<(String, AnchorRef)>,
}

impl BodyRecord {
    /// Structural parent.
    #[must_use]
    pub fn parent(&self) -> Option<BodyId> {
        self.parent
    }

    /// Structural children.
    #[must_use]
    pub fn children(&self) -> &[BodyId] {
        &self.children
    }

    /// Vessel this body belongs to.
    #[must_use]
    pub fn vessel(&self) -> VesselId {
        self.vessel
    }

    /// Body this one is auto-strutted to, if any.
    #[must_use]
    pub fn strut_to(&self) -> Option<BodyId> {
        self.strut_to
    }

    /// Anchor linkages created by coupling: `(own node, counterpart anchor)`.
    #[must_use]
    pub fn couplings(&self) -> &[(String, AnchorRef)] {
        &self.couplings
    }
}

/// One vessel.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselRecord {
    /// Vessel id.
    pub id: VesselId,
    /// Root body.
    pub root: BodyId,
    /// Name and category.
    pub info: VesselInfo,
}

/// Summary handed to a [`DominanceHeuristic`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VesselSummary {
    /// Vessel id.
    pub vessel: VesselId,
    /// Root body.
    pub root: BodyId,
    /// Total mass.
    pub mass: f64,
    /// Number of bodies.
    pub body_count: usize,
    /// Whether the vessel holds control focus.
    pub has_focus: bool,
}

/// Which of two candidates wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The first argument.
    First,
    /// The second argument.
    Second,
}

/// Picks the side that stays root when two vessels are coupled.
pub trait DominanceHeuristic {
    /// Decide between two vessels.
    fn dominant(&self, a: &VesselSummary, b: &VesselSummary) -> Side;
}

/// Default dominance: focused vessel, then heavier, then more bodies, then
/// the lower vessel id.
#[derive(Debug, Clone, Copy, Default)]
pub struct MassDominance;

impl DominanceHeuristic for MassDominance {
    fn dominant(&self, a: &VesselSummary, b: &VesselSummary) -> Side {
        if a.has_focus != b.has_focus {
            return if a.has_focus { Side::First } else { Side::Second };
        }
        if (a.mass - b.mass).abs() > 1e-9 {
            return if a.mass > b.mass {
                Side::First
            } else {
                Side::Second
            };
        }
        if a.body_count != b.body_count {
            return if a.body_count > b.body_count {
                Side::First
            } else {
                Side::Second
            };
        }
        if a.vessel <= b.vessel {
            Side::First
        } else {
            Side::Second
        }
    }
}

/// Record of one coupling, enough to undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupling {
    /// Anchor on the side that stayed root.
    pub parent: AnchorRef,
    /// Anchor on the side that was reparented.
    pub child: AnchorRef,
    /// Root body of the merged vessel.
    pub root: BodyId,
    /// Identity of the parent side before coupling.
    pub parent_info: Option<VesselInfo>,
    /// Identity of the child side before coupling.
    pub child_info: Option<VesselInfo>,
}

/// Arena of bodies and vessels.
#[derive(Debug, Clone, Default)]
pub struct VesselTree {
    bodies: HashMap<BodyId, BodyRecord>,
    vessels: HashMap<VesselId, VesselRecord>,
    focus: Option<VesselId>,
    next_body: u64,
    next_vessel: u64,
}

impl VesselTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body as a new single-body vessel.
    pub fn add_body(&mut self, name: impl Into<String>, mass: f64, pose: Isometry3<f64>) -> BodyId {
        let id = BodyId::new(self.next_body);
        self.next_body += 1;
        let name = name.into();
        let vessel = self.new_vessel(VesselInfo::new(name.clone(), VesselKind::Ship, id));
        self.bodies.insert(
            id,
            BodyRecord {
                id,
                name,
                mass: mass.max(0.0),
                pose,
                auto_strut: AutoStrutMode::Off,
                parent: None,
                children: SmallVec::new(),
                vessel,
                strut_to: None,
                couplings: Vec::new(),
            },
        );
        id
    }

    fn new_vessel(&mut self, info: VesselInfo) -> VesselId {
        let id = VesselId::new(self.next_vessel);
        self.next_vessel += 1;
        self.vessels.insert(
            id,
            VesselRecord {
                id,
                root: info.root,
                info,
            },
        );
        id
    }

    /// Attach the root of one vessel under a body of another.
    ///
    /// Used to build vessels; no anchor linkage or identity snapshot is
    /// recorded.
    pub fn attach(&mut self, child: BodyId, parent: BodyId) -> Result<()> {
        let child_vessel = self.vessel_of(child)?;
        let parent_vessel = self.vessel_of(parent)?;
        if child_vessel == parent_vessel {
            return Err(LinkError::SameVessel(child, parent));
        }
        self.reroot(child)?;
        self.graft(child, parent, child_vessel, parent_vessel);
        self.recompute_struts(parent_vessel);
        Ok(())
    }

    /// Look up a body.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&BodyRecord> {
        self.bodies.get(&id)
    }

    /// Look up a body mutably.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut BodyRecord> {
        self.bodies.get_mut(&id)
    }

    /// Whether a body exists.
    #[must_use]
    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    /// Look up a vessel.
    #[must_use]
    pub fn vessel(&self, id: VesselId) -> Option<&VesselRecord> {
        self.vessels.get(&id)
    }

    /// Number of bodies.
    #[must_use]
    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Number of vessels.
    #[must_use]
    pub fn num_vessels(&self) -> usize {
        self.vessels.len()
    }

    /// Vessel of a body.
    pub fn vessel_of(&self, body: BodyId) -> Result<VesselId> {
        self.bodies
            .get(&body)
            .map(|b| b.vessel)
            .ok_or(LinkError::UnknownBody(body))
    }

    /// Root body of a body's vessel.
    pub fn root_of(&self, body: BodyId) -> Result<BodyId> {
        let vessel = self.vessel_of(body)?;
        self.vessels
            .get(&vessel)
            .map(|v| v.root)
            .ok_or(LinkError::UnknownBody(body))
    }

    /// Whether two bodies share a vessel.
    #[must_use]
    pub fn same_vessel(&self, a: BodyId, b: BodyId) -> bool {
        match (self.vessel_of(a), self.vessel_of(b)) {
            (Ok(va), Ok(vb)) => va == vb,
            _ => false,
        }
    }

    /// Vessel holding control focus.
    #[must_use]
    pub fn focus(&self) -> Option<VesselId> {
        self.focus
    }

    /// Give control focus to a vessel.
    pub fn set_focus(&mut self, vessel: Option<VesselId>) {
        self.focus = vessel.filter(|v| self.vessels.contains_key(v));
    }

    /// All bodies of the subtree rooted at `root`, depth first.
    #[must_use]
    pub fn subtree(&self, root: BodyId) -> Vec<BodyId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(body) = self.bodies.get(&id) {
                out.push(id);
                stack.extend(body.children.iter().rev().copied());
            }
        }
        out
    }

    /// All bodies of a vessel, depth first from the root.
    #[must_use]
    pub fn bodies_in(&self, vessel: VesselId) -> Vec<BodyId> {
        self.vessels
            .get(&vessel)
            .map_or_else(Vec::new, |v| self.subtree(v.root))
    }

    /// Summary used by dominance heuristics.
    pub fn summary(&self, vessel: VesselId) -> Option<VesselSummary> {
        let record = self.vessels.get(&vessel)?;
        let bodies = self.bodies_in(vessel);
        let mass = bodies
            .iter()
            .filter_map(|id| self.bodies.get(id))
            .map(|b| b.mass)
            .sum();
        Some(VesselSummary {
            vessel,
            root: record.root,
            mass,
            body_count: bodies.len(),
            has_focus: self.focus == Some(vessel),
        })
    }

    /// Make `new_root` the root of its vessel by reversing the parent chain.
    pub fn reroot(&mut self, new_root: BodyId) -> Result<()> {
        let vessel = self.vessel_of(new_root)?;
        let mut path = vec![new_root];
        let mut cursor = new_root;
        while let Some(parent) = self.bodies.get(&cursor).and_then(|b| b.parent) {
            path.push(parent);
            cursor = parent;
        }
        for pair in path.windows(2) {
            let (node, old_parent) = (pair[0], pair[1]);
            if let Some(p) = self.bodies.get_mut(&old_parent) {
                p.children.retain(|c| *c != node);
                p.parent = Some(node);
            }
            if let Some(n) = self.bodies.get_mut(&node) {
                n.children.push(old_parent);
            }
        }
        if let Some(root) = self.bodies.get_mut(&new_root) {
            root.parent = None;
        }
        if let Some(v) = self.vessels.get_mut(&vessel) {
            v.root = new_root;
        }
        Ok(())
    }

    /// Hang `child` (already a root) under `parent` and merge vessel ids.
    fn graft(&mut self, child: BodyId, parent: BodyId, child_vessel: VesselId, into: VesselId) {
        for id in self.subtree(child) {
            if let Some(b) = self.bodies.get_mut(&id) {
                b.vessel = into;
            }
        }
        if let Some(c) = self.bodies.get_mut(&child) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.bodies.get_mut(&parent) {
            p.children.push(child);
        }
        self.vessels.remove(&child_vessel);
        if self.focus == Some(child_vessel) {
            self.focus = Some(into);
        }
    }

    /// Merge the vessels of two anchors into one.
    ///
    /// With `prefer_dominant`, the heuristic picks which side stays root and
    /// the anchors are swapped so the dominant body is the attachment parent.
    /// Otherwise the target side stays root. Control focus held by either
    /// side ends up on the merged vessel.
    pub fn couple(
        &mut self,
        source: &AnchorRef,
        target: &AnchorRef,
        prefer_dominant: bool,
        heuristic: &dyn DominanceHeuristic,
    ) -> Result<Coupling> {
        let source_vessel = self.vessel_of(source.body)?;
        let target_vessel = self.vessel_of(target.body)?;
        if source_vessel == target_vessel {
            return Err(LinkError::SameVessel(source.body, target.body));
        }

        let source_is_parent = prefer_dominant
            && match (self.summary(source_vessel), self.summary(target_vessel)) {
                (Some(s), Some(t)) => heuristic.dominant(&s, &t) == Side::First,
                _ => false,
            };
        let (parent, child) = if source_is_parent {
            (source, target)
        } else {
            (target, source)
        };
        let (parent_vessel, child_vessel) = if source_is_parent {
            (source_vessel, target_vessel)
        } else {
            (target_vessel, source_vessel)
        };

        let parent_info = self.vessels.get(&parent_vessel).map(|v| v.info.clone());
        let child_info = self.vessels.get(&child_vessel).map(|v| v.info.clone());

        self.reroot(child.body)?;
        self.graft(child.body, parent.body, child_vessel, parent_vessel);

        if let Some(p) = self.bodies.get_mut(&parent.body) {
            p.couplings.push((parent.node.clone(), child.clone()));
        }
        if let Some(c) = self.bodies.get_mut(&child.body) {
            c.couplings.push((child.node.clone(), parent.clone()));
        }

        self.recompute_struts(parent_vessel);
        let root = self.root_of(parent.body)?;
        info!(
            parent = %parent,
            child = %child,
            vessel = %parent_vessel,
            "coupled vessels"
        );

        Ok(Coupling {
            parent: parent.clone(),
            child: child.clone(),
            root,
            parent_info,
            child_info,
        })
    }

    /// Split two directly coupled bodies.
    ///
    /// `a` and `b` must be in a parent/child relation (either order), else
    /// [`LinkError::NotCoupled`] is returned and nothing changes. Observers on
    /// both anchors are notified before the split. The child side becomes a
    /// new vessel; each side takes its snapshot identity (and original root)
    /// when one is given. A child side without a snapshot gets a debris
    /// identity. Auto-struts are recomputed on both pieces.
    ///
    /// Returns the id of the newly independent vessel.
    pub fn decouple(
        &mut self,
        a: &AnchorRef,
        b: &AnchorRef,
        info_a: Option<&VesselInfo>,
        info_b: Option<&VesselInfo>,
        observers: &mut DecoupleObservers,
    ) -> Result<VesselId> {
        let body_a = self.bodies.get(&a.body).ok_or(LinkError::UnknownBody(a.body))?;
        let body_b = self.bodies.get(&b.body).ok_or(LinkError::UnknownBody(b.body))?;

        let (parent, child, parent_info, child_info) = if body_b.parent == Some(a.body) {
            (a, b, info_a, info_b)
        } else if body_a.parent == Some(b.body) {
            (b, a, info_b, info_a)
        } else {
            return Err(LinkError::NotCoupled(a.body, b.body));
        };

        observers.dispatch(parent, false);
        observers.dispatch(child, true);

        let parent_vessel = self.vessel_of(parent.body)?;
        if let Some(p) = self.bodies.get_mut(&parent.body) {
            p.children.retain(|c| *c != child.body);
            p.couplings.retain(|(_, other)| other != child);
        }
        if let Some(c) = self.bodies.get_mut(&child.body) {
            c.parent = None;
            c.couplings.retain(|(_, other)| other != parent);
        }

        let child_name = self
            .bodies
            .get(&child.body)
            .map(|b| b.name.clone())
            .unwrap_or_default();
        let child_vessel = self.new_vessel(VesselInfo::debris(&child_name, child.body));
        for id in self.subtree(child.body) {
            if let Some(body) = self.bodies.get_mut(&id) {
                body.vessel = child_vessel;
            }
        }

        self.restore_identity(child_vessel, child_info);
        self.restore_identity(parent_vessel, parent_info);

        self.recompute_struts(parent_vessel);
        self.recompute_struts(child_vessel);

        info!(
            parent = %parent,
            child = %child,
            new_vessel = %child_vessel,
            "decoupled vessels"
        );
        Ok(child_vessel)
    }

    fn restore_identity(&mut self, vessel: VesselId, info: Option<&VesselInfo>) {
        let Some(info) = info else {
            return;
        };
        let restore_root = self
            .bodies
            .get(&info.root)
            .is_some_and(|b| b.vessel == vessel);
        if restore_root {
            if let Err(e) = self.reroot(info.root) {
                debug!(error = %e, "could not restore vessel root");
            }
        }
        if let Some(record) = self.vessels.get_mut(&vessel) {
            record.info = VesselInfo {
                name: info.name.clone(),
                kind: info.kind,
                root: record.root,
            };
        }
    }

    /// Recompute automatic struts for every body of a vessel.
    pub fn recompute_struts(&mut self, vessel: VesselId) {
        let Some(root) = self.vessels.get(&vessel).map(|v| v.root) else {
            return;
        };
        let bodies = self.subtree(root);
        let heaviest = bodies
            .iter()
            .filter_map(|id| self.bodies.get(id))
            .fold(None::<&BodyRecord>, |best, b| match best {
                Some(cur) if cur.mass > b.mass || (cur.mass == b.mass && cur.id < b.id) => {
                    Some(cur)
                }
                _ => Some(b),
            })
            .map(|b| b.id);

        for id in bodies {
            if let Some(body) = self.bodies.get_mut(&id) {
                let target = match body.auto_strut {
                    AutoStrutMode::Off => None,
                    AutoStrutMode::Root => Some(root),
                    AutoStrutMode::Heaviest => heaviest,
                };
                body.strut_to = target.filter(|t| *t != id);
            }
        }
    }

    /// Remove a body, splitting it from its parent and children.
    ///
    /// Children become independent debris vessels. Focus on a vessel that
    /// disappears is dropped.
    pub fn remove_body(&mut self, id: BodyId) -> Result<()> {
        let record = self.bodies.get(&id).ok_or(LinkError::UnknownBody(id))?.clone();

        if let Some(parent) = record.parent {
            if let Some(p) = self.bodies.get_mut(&parent) {
                p.children.retain(|c| *c != id);
                p.couplings.retain(|(_, other)| other.body != id);
            }
        }

        let was_root = record.parent.is_none();
        for child in record.children.iter().copied() {
            let name = self
                .bodies
                .get(&child)
                .map(|b| b.name.clone())
                .unwrap_or_default();
            let vessel = self.new_vessel(VesselInfo::debris(&name, child));
            for body in self.subtree(child) {
                if let Some(b) = self.bodies.get_mut(&body) {
                    b.vessel = vessel;
                }
            }
            if let Some(c) = self.bodies.get_mut(&child) {
                c.parent = None;
                c.couplings.retain(|(_, other)| other.body != id);
            }
            self.recompute_struts(vessel);
        }

        self.bodies.remove(&id);
        if was_root {
            self.vessels.remove(&record.vessel);
            if self.focus == Some(record.vessel) {
                self.focus = None;
            }
        } else {
            self.recompute_struts(record.vessel);
        }
        Ok(())
    }
}
