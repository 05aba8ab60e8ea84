//! Rebalancing between siblings and node splits.

use tracing::trace;

use super::Tree;
use crate::common::format::ITEM_HEADER_SIZE as IH;
use crate::common::{Error, NodeId, Result};
use crate::item::Item;
use crate::node::{Direction, InsertPoint, Node, ShiftHint};

impl Tree {
    /// Shift data from `src` into its neighbour `dst` and fix the keys and
    /// parent links the move affected.
    pub(crate) fn tree_shift(&mut self, src: NodeId, dst: NodeId, hint: &mut ShiftHint) -> Result<()> {
        {
            let (from, to) = self.cache.get2_mut(src, dst)?;
            from.node.shift(&mut to.node, hint)?;
            from.dirty = true;
            to.dirty = true;
        }
        if !hint.moved_anything() {
            return Ok(());
        }
        trace!(
            direction = ?hint.direction,
            items = hint.items,
            units = hint.units,
            bytes = hint.bytes,
            "shifted"
        );

        self.refresh_child_links(src)?;
        self.refresh_child_links(dst)?;
        match hint.direction {
            Direction::Left => self.update_keys(src),
            Direction::Right => self.update_keys(dst),
        }
    }

    /// Make room in node `id` for `item` at `point`.
    ///
    /// Tries, in order: shifting into the left neighbour, shifting into the
    /// right neighbour, then up to two fresh right siblings. The insertion
    /// point follows the data it sits next to and may end up in another
    /// node; the final node and point are returned.
    ///
    /// # Errors
    /// Returns `Error::NoSpace` if the item still does not fit.
    pub(crate) fn tree_expand(
        &mut self,
        id: NodeId,
        point: InsertPoint,
        item: &Item,
    ) -> Result<(NodeId, InsertPoint)> {
        let needed = item.encoded_len() + IH;
        let mut id = id;
        let mut point = point;

        let mut moved = false;
        if let Some(left) = self.neighbor(id, Direction::Left)? {
            let mut hint = ShiftHint::new(Direction::Left).with_point(point, needed);
            self.tree_shift(id, left, &mut hint)?;
            (id, point) = self.follow_point(id, left, &hint, point, item)?;
            if self.fits(id, point, item)? {
                return Ok((id, point));
            }
            moved = hint.point_moved;
        }

        let right = if moved {
            None
        } else {
            self.neighbor(id, Direction::Right)?
        };
        if let Some(right) = right {
            let mut hint = ShiftHint::new(Direction::Right).with_point(point, needed);
            self.tree_shift(id, right, &mut hint)?;
            (id, point) = self.follow_point(id, right, &hint, point, item)?;
            if self.fits(id, point, item)? {
                return Ok((id, point));
            }
        }

        for _ in 0..2 {
            let level = self.node(id)?.level();
            let new = self.alloc_node(level)?;
            let mut hint = ShiftHint::new(Direction::Right).with_point(point, needed);
            self.tree_shift(id, new, &mut hint)?;

            if self.node(new)?.is_empty() && !hint.point_moved {
                self.release_node(new)?;
                break;
            }
            self.insert_into_parent(id, new, item.key)?;
            (id, point) = self.follow_point(id, new, &hint, point, item)?;
            if self.fits(id, point, item)? {
                return Ok((id, point));
            }
        }
        Err(Error::NoSpace)
    }

    /// Node and insertion point after a shift from `src` to `dst`.
    fn follow_point(
        &self,
        src: NodeId,
        dst: NodeId,
        hint: &ShiftHint,
        old: InsertPoint,
        item: &Item,
    ) -> Result<(NodeId, InsertPoint)> {
        let (id, point) = match hint.point {
            Some(point) if hint.point_moved => (dst, point),
            Some(point) => (src, point),
            None => (src, old),
        };
        let point = match point {
            InsertPoint::Gap { item: gap } => self.node(id)?.place_in_gap(gap, item),
            paste => paste,
        };
        Ok((id, point))
    }

    fn fits(&self, id: NodeId, point: InsertPoint, item: &Item) -> Result<bool> {
        Ok(Node::space_for(point, item) <= self.node(id)?.free_space())
    }
}
