//! Insertion and in-place modification.

use tracing::trace;

use super::{ParentLink, Tree};
use crate::common::format::{ITEM_HEADER_SIZE as IH, LEAF_LEVEL};
use crate::common::{Error, Key, NodeId, Result};
use crate::coord::{Between, Coord};
use crate::item::{DirEntry, Item, ItemBody};
use crate::node::{Bias, InsertPoint, Lookup, Node};

impl Tree {
    /// Insert `item` into the leaf level.
    ///
    /// The item is pasted into a neighbouring item it continues, otherwise
    /// it becomes a new item. Nodes are rebalanced or split as needed.
    ///
    /// # Errors
    /// - `Error::AlreadyExists` if a unit with the item's key is stored
    /// - `Error::InvalidArgument` for a branch item or one larger than a node
    /// - `Error::NoSpace` if no blocks are left
    /// - `Error::ReadOnly` on a read-only tree
    pub fn insert(&mut self, item: &Item) -> Result<Coord> {
        self.ensure_writable()?;
        self.maybe_evict(None)?;
        self.insert_at(item, LEAF_LEVEL)
    }

    /// Insert `item` on `level` (branch items go above the leaves).
    pub(crate) fn insert_at(&mut self, item: &Item, level: u8) -> Result<Coord> {
        if item.kind().is_branch() != (level > LEAF_LEVEL) {
            return Err(Error::invalid(format!(
                "{} item cannot go on level {}",
                item.kind(),
                level
            )));
        }
        if item.encoded_len() + IH > Node::capacity(self.config.node_size, self.config.format) {
            return Err(Error::invalid(format!(
                "item of {} bytes cannot fit a {}-byte node",
                item.encoded_len(),
                self.config.node_size
            )));
        }

        if self.root.is_none() {
            if level != LEAF_LEVEL {
                return Err(Error::invalid("empty tree has no internal levels"));
            }
            let root = self.alloc_node(LEAF_LEVEL)?;
            self.root = Some(root);
            self.height = LEAF_LEVEL;
        }
        if level > self.height {
            return Err(Error::invalid(format!(
                "level {} above the root at {}",
                level, self.height
            )));
        }

        let (found, coord) = self.coord_by_key(&item.key, level, Bias::Exact)?;
        if found == Lookup::Present {
            return Err(Error::AlreadyExists);
        }
        let point = self.node(coord.node)?.resolve_place(&coord, item)?;
        self.insert_at_point(coord.node, point, item)
    }

    /// Put `item` at `point` of node `id`, making room first if needed.
    pub(crate) fn insert_at_point(
        &mut self,
        id: NodeId,
        point: InsertPoint,
        item: &Item,
    ) -> Result<Coord> {
        let (id, point) = if Node::space_for(point, item) > self.node(id)?.free_space() {
            self.tree_expand(id, point, item)?
        } else {
            (id, point)
        };

        self.node_mut(id)?.insert(point, item)?;
        self.refresh_child_links(id)?;

        let (pos, unit) = match point {
            InsertPoint::Gap { item } => (item, 0),
            InsertPoint::Paste { item, unit } => (item, unit),
        };
        if pos == 0 && unit == 0 {
            self.update_keys(id)?;
        }
        Ok(Coord {
            node: id,
            item: pos,
            unit,
            between: Between::AtUnit,
        })
    }

    /// Hang `new`, the right sibling of `cur`, into the parent of `cur`.
    ///
    /// `fallback` keys the pointer when `new` is still empty.
    pub(crate) fn insert_into_parent(&mut self, cur: NodeId, new: NodeId, fallback: Key) -> Result<()> {
        if Some(cur) == self.root {
            self.growup()?;
        }
        let (parent, pos) = self.parent_pos(cur)?;
        let node = self.node(new)?;
        let key = node.leftmost_key().unwrap_or(fallback);
        let ptr = Item::node_ptr(key, node.block());

        self.cache.get_mut(new)?.parent = Some(ParentLink {
            node: parent,
            pos: pos + 1,
        });
        self.insert_at_point(parent, InsertPoint::Gap { item: pos + 1 }, &ptr)?;
        self.cache.forget_siblings();
        Ok(())
    }

    /// Propagate a changed leftmost key of `id` into its ancestors.
    pub(crate) fn update_keys(&mut self, id: NodeId) -> Result<()> {
        let mut cur = id;
        loop {
            if Some(cur) == self.root || self.cache.get(cur)?.parent.is_none() {
                return Ok(());
            }
            let Some(key) = self.node(cur)?.leftmost_key() else {
                return Ok(());
            };
            let (parent, pos) = self.parent_pos(cur)?;
            if self.node(parent)?.key_at(pos) == key {
                return Ok(());
            }
            trace!(block = self.node(parent)?.block().0, pos, %key, "updating delimiting key");
            self.node_mut(parent)?.set_key_at(pos, &key);
            if pos != 0 {
                return Ok(());
            }
            cur = parent;
        }
    }

    /// Overwrite the units at `coord` with those of `data`.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if `coord` does not address a unit or
    /// `data` would change the item size.
    pub fn write(&mut self, coord: &Coord, data: &Item) -> Result<()> {
        self.ensure_writable()?;
        self.maybe_evict(Some(coord.node))?;
        if !coord.is_existing_unit(self.node(coord.node)?) {
            return Err(Error::invalid("write at a coordinate without a unit"));
        }
        self.node_mut(coord.node)?.write(coord.item, coord.unit, data)
    }

    /// Add entry `name` to directory `dir`, pointing at object
    /// `(target_locality, target_objectid)`.
    ///
    /// Names whose keys collide with entries already stored get the next
    /// free generation.
    ///
    /// # Errors
    /// - `Error::AlreadyExists` if the directory has an entry `name`
    /// - `Error::NoSpace` if every generation of the key is taken
    pub fn add_entry(
        &mut self,
        dir: u64,
        name: &[u8],
        target_locality: u64,
        target_objectid: u64,
    ) -> Result<Coord> {
        self.ensure_writable()?;
        self.maybe_evict(None)?;
        let key = DirEntry::entry_key(dir, name, 0)?;

        let mut duplicate = false;
        let mut last_generation: Option<u8> = None;
        self.lookup_collision(&key, |unit| {
            if let ItemBody::DirEntry(entries) = &unit.body {
                duplicate |= entries.0.iter().any(|e| e.has_name(name));
            }
            last_generation = last_generation.max(Some(unit.key.generation()));
            false
        })?;
        if duplicate {
            return Err(Error::AlreadyExists);
        }

        let generation = match last_generation {
            None => 0,
            Some(u8::MAX) => return Err(Error::NoSpace),
            Some(g) => g + 1,
        };
        let entry = DirEntry::new(dir, name, target_locality, target_objectid, generation)?;
        self.insert_at(&Item::dir_entry(entry), LEAF_LEVEL)
    }
}
