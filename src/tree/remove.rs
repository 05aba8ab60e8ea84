//! Removal, detaching empty nodes and packing.

use tracing::debug;

use super::Tree;
use crate::common::{Error, Key, NodeId, Result};
use crate::coord::Coord;
use crate::node::{Bias, Direction, Lookup, ShiftHint};

impl Tree {
    /// Remove `count` units starting at the unit `coord` points at.
    ///
    /// A leaf left empty is detached from the tree, and a root left with a
    /// single pointer is dried out.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if `coord` does not address a unit
    /// or the range runs past the end of the item.
    pub fn remove(&mut self, coord: &Coord, count: usize) -> Result<()> {
        self.remove_units(coord, count, false)
    }

    /// Like [`remove`](Self::remove), then squeeze the leaf into its
    /// neighbours.
    pub fn remove_and_pack(&mut self, coord: &Coord, count: usize) -> Result<()> {
        self.remove_units(coord, count, true)
    }

    /// Remove the unit stored under `key`.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if there is none.
    pub fn remove_key(&mut self, key: &Key) -> Result<()> {
        self.ensure_writable()?;
        match self.lookup(key, Bias::Exact)? {
            (Lookup::Present, coord) => self.remove_units(&coord, 1, false),
            (Lookup::Absent, _) => Err(Error::NotFound),
        }
    }

    /// Remove every unit of the item at `coord` from the addressed unit on.
    pub fn truncate(&mut self, coord: &Coord) -> Result<()> {
        self.ensure_writable()?;
        self.check_unit(coord)?;
        self.node_mut(coord.node)?.truncate(coord.item, coord.unit)?;
        self.settle(coord.node, coord.item, false)
    }

    /// Remove directory entry `name` of directory `dir`.
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the directory has no such entry.
    pub fn remove_entry(&mut self, dir: u64, name: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let (coord, _) = self.find_entry(dir, name)?.ok_or(Error::NotFound)?;
        self.remove_units(&coord, 1, false)
    }

    fn remove_units(&mut self, coord: &Coord, count: usize, pack: bool) -> Result<()> {
        self.ensure_writable()?;
        self.check_unit(coord)?;
        self.maybe_evict(Some(coord.node))?;
        self.node_mut(coord.node)?.remove(coord.item, coord.unit, count)?;
        self.settle(coord.node, coord.item, pack)
    }

    fn check_unit(&self, coord: &Coord) -> Result<()> {
        if coord.is_existing_unit(self.node(coord.node)?) {
            Ok(())
        } else {
            Err(Error::invalid("coordinate does not address a unit"))
        }
    }

    /// Restore the tree invariants after data left node `id` at item `pos`.
    fn settle(&mut self, id: NodeId, pos: usize, pack: bool) -> Result<()> {
        if pos == 0 {
            self.update_keys(id)?;
        }
        if self.node(id)?.is_empty() {
            if Some(id) != self.root {
                self.detach_node(id)?;
            }
        } else if pack {
            self.pack(id)?;
        }
        self.shrink_root()
    }

    /// Unhook the empty node `id` from its parent.
    ///
    /// A pinned node stays loaded until its last pin goes; any other node is
    /// released at once. A parent left empty is detached in turn, and an
    /// empty root empties the tree.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for the root or a non-empty node.
    pub fn detach_node(&mut self, id: NodeId) -> Result<()> {
        self.ensure_writable()?;
        if Some(id) == self.root {
            return Err(Error::invalid("the root cannot be detached"));
        }
        if !self.node(id)?.is_empty() {
            return Err(Error::invalid(format!("{} still holds items", id)));
        }

        let (parent, pos) = self.parent_pos(id)?;
        self.node_mut(parent)?.remove(pos, 0, 1)?;
        self.discard_node(id)?;
        self.refresh_child_links(parent)?;
        self.cache.forget_siblings();

        if self.node(parent)?.is_empty() {
            if Some(parent) == self.root {
                self.discard_node(parent)?;
                self.root = None;
                self.height = 0;
                debug!("tree is empty");
                Ok(())
            } else {
                self.detach_node(parent)
            }
        } else if pos == 0 {
            self.update_keys(parent)
        } else {
            Ok(())
        }
    }

    /// Move the content of `id` into its left neighbour, then pull data from
    /// its right neighbour into it.
    fn pack(&mut self, id: NodeId) -> Result<()> {
        if let Some(left) = self.neighbor(id, Direction::Left)? {
            let mut hint = ShiftHint::new(Direction::Left);
            self.tree_shift(id, left, &mut hint)?;
            if self.node(id)?.is_empty() {
                return self.detach_node(id);
            }
        }
        if let Some(right) = self.neighbor(id, Direction::Right)? {
            let mut hint = ShiftHint::new(Direction::Left);
            self.tree_shift(right, id, &mut hint)?;
            if self.node(right)?.is_empty() {
                return self.detach_node(right);
            }
        }
        Ok(())
    }
}
