//! The node cache: an arena of loaded nodes addressed by [`NodeId`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        NodeCache                         │
//! │  ┌──────────────┐    ┌──────────────────────────────┐    │
//! │  │  by_block    │    │       slots: Vec<Slot>       │    │
//! │  │BlockNr → Id  │───▶│ [gen|Znode] [gen|-] [gen|Z]  │    │
//! │  └──────────────┘    └──────────────────────────────┘    │
//! │  ┌──────────────┐                                        │
//! │  │  free list   │  indices of empty slots                │
//! │  └──────────────┘                                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Removing a node bumps its slot's generation, so every handle issued for
//! it resolves to `Error::StaleHandle` from then on.

use std::collections::{HashMap, HashSet};

use crate::common::{BlockNr, Error, NodeId, Result};
use crate::node::Node;

/// Position of a node inside its parent.
///
/// `pos` is a guess: it is refreshed whenever the parent changes, and the
/// tree verifies it before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub node: NodeId,
    pub pos: usize,
}

/// A cached node and its in-memory bookkeeping.
#[derive(Debug)]
pub struct Znode {
    pub node: Node,
    pub parent: Option<ParentLink>,
    /// Sibling handles, resolved lazily and dropped on any attach/detach.
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    /// References that keep the node loaded.
    pub pins: u32,
    /// Modified since the last write-back.
    pub dirty: bool,
    /// Detached from the tree while pinned; released on the last unpin.
    pub heard_banshee: bool,
}

impl Znode {
    pub fn new(node: Node, parent: Option<ParentLink>) -> Self {
        Self {
            node,
            parent,
            left: None,
            right: None,
            pins: 0,
            dirty: false,
            heard_banshee: false,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Znode>,
}

#[derive(Debug, Default)]
pub struct NodeCache {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_block: HashMap<BlockNr, NodeId>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached nodes.
    pub fn len(&self) -> usize {
        self.by_block.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_block.is_empty()
    }

    /// Add a node, returning its handle.
    ///
    /// # Errors
    /// Returns `Error::AlreadyExists` if a node for the same block is cached.
    pub fn insert(&mut self, znode: Znode) -> Result<NodeId> {
        let block = znode.node.block();
        if self.by_block.contains_key(&block) {
            return Err(Error::AlreadyExists);
        }
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(znode);
        let id = NodeId::new(index, slot.generation);
        self.by_block.insert(block, id);
        Ok(id)
    }

    /// Handle of the cached node for `block`.
    pub fn lookup_block(&self, block: BlockNr) -> Option<NodeId> {
        self.by_block.get(&block).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: NodeId) -> Result<&Znode> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_ref())
            .ok_or(Error::StaleHandle)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Znode> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_mut())
            .ok_or(Error::StaleHandle)
    }

    /// Mutable access to two distinct nodes at once.
    pub fn get2_mut(&mut self, a: NodeId, b: NodeId) -> Result<(&mut Znode, &mut Znode)> {
        if a.index() == b.index() {
            return Err(Error::invalid(format!("{} and {} share a slot", a, b)));
        }
        self.get(a)?;
        self.get(b)?;

        let (lo, hi) = (a.index().min(b.index()), a.index().max(b.index()));
        let (head, tail) = self.slots.split_at_mut(hi);
        let (first, second) = (&mut head[lo], &mut tail[0]);
        let (za, zb) = match (first.entry.as_mut(), second.entry.as_mut()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(Error::StaleHandle),
        };
        if a.index() < b.index() {
            Ok((za, zb))
        } else {
            Ok((zb, za))
        }
    }

    /// Unload a node; its handle becomes stale.
    pub fn remove(&mut self, id: NodeId) -> Result<Znode> {
        self.get(id)?;
        let slot = &mut self.slots[id.index()];
        let znode = slot.entry.take().ok_or(Error::StaleHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        self.by_block.remove(&znode.node.block());
        Ok(znode)
    }

    /// Handles of every cached node.
    pub fn ids(&self) -> Vec<NodeId> {
        self.by_block.values().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Znode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry
                .as_ref()
                .map(|z| (NodeId::new(index as u32, slot.generation), z))
        })
    }

    /// Drop every cached sibling link.
    pub fn forget_siblings(&mut self) {
        for slot in &mut self.slots {
            if let Some(z) = slot.entry.as_mut() {
                z.left = None;
                z.right = None;
            }
        }
    }
}

/// Pick up to `want` nodes that can be unloaded.
///
/// A node qualifies when it is unpinned, clean, attached, not the root and
/// none of its children are cached.
pub fn select_victims(cache: &NodeCache, root: Option<NodeId>, want: usize) -> Vec<NodeId> {
    let with_children: HashSet<NodeId> = cache
        .iter()
        .filter_map(|(_, z)| z.parent.map(|link| link.node))
        .collect();

    cache
        .iter()
        .filter(|(id, z)| {
            Some(*id) != root
                && z.pins == 0
                && !z.dirty
                && !z.heard_banshee
                && z.parent.is_some()
                && !with_children.contains(id)
        })
        .map(|(id, _)| id)
        .take(want)
        .collect()
}
