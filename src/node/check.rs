//! Structural validation of a single node.

use super::header::body_start_of;
use super::Node;
use crate::common::format::{ITEM_HEADER_SIZE as IH, LEAF_LEVEL, NODE_MAGIC};
use crate::common::{Error, Result};
use crate::item::Item;

impl Node {
    /// Validate everything that can be checked without the rest of the tree.
    ///
    /// - magic and free space accounting
    /// - item bodies lie in the used area, in order
    /// - branch items exactly on internal levels
    /// - every body decodes to exactly its stored length
    /// - item keys ascend and match the key of their first unit
    /// - no two neighbouring items could be merged
    ///
    /// # Errors
    /// Returns `Error::Corrupted` naming the first violation found.
    pub fn check(&self) -> Result<()> {
        let block = self.block().0;
        let header = self.header();
        if header.magic != NODE_MAGIC {
            return Err(Error::corrupted(block, "bad node magic"));
        }
        if self.level() < LEAF_LEVEL {
            return Err(Error::corrupted(block, "node level 0"));
        }

        self.check_layout()?;

        let items = self.items();
        let mut prev: Option<Item> = None;
        for pos in 0..items {
            let kind = self.item_kind(pos)?;
            if kind.is_branch() == self.is_leaf() {
                return Err(Error::corrupted(
                    block,
                    format!("{} item {} on level {}", kind, pos, self.level()),
                ));
            }

            let item = self.item(pos)?;
            if item.encoded_len() != self.item_length(pos) {
                return Err(Error::corrupted(
                    block,
                    format!("item {} has trailing bytes", pos),
                ));
            }
            if item.unit_key(0) != item.key {
                return Err(Error::corrupted(
                    block,
                    format!("item {} key differs from its first unit", pos),
                ));
            }
            for unit in 1..item.units() {
                if item.unit_key(unit) < item.unit_key(unit - 1) {
                    return Err(Error::corrupted(
                        block,
                        format!("item {} unit {} out of order", pos, unit),
                    ));
                }
            }

            if let Some(prev) = &prev {
                if prev.key > item.key {
                    return Err(Error::corrupted(block, format!("item {} out of order", pos)));
                }
                if prev.mergeable(&item) {
                    return Err(Error::corrupted(
                        block,
                        format!("items {} and {} should be one item", pos - 1, pos),
                    ));
                }
            }
            prev = Some(item);
        }
        Ok(())
    }

    /// Validate free space accounting and that item bodies tile the used
    /// area in order.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` naming the first violation found.
    pub fn check_layout(&self) -> Result<()> {
        let block = self.block().0;
        let items = self.items();
        let fss = self.free_space_start();
        if fss + self.free_space() + items * IH != self.size() {
            return Err(Error::corrupted(block, "free space accounting mismatch"));
        }

        let mut prev_end = body_start_of(self.format());
        for pos in 0..items {
            let offset = self.item_offset(pos);
            if offset != prev_end {
                return Err(Error::corrupted(
                    block,
                    format!("item {} body at {}, expected {}", pos, offset, prev_end),
                ));
            }
            let end = if pos + 1 < items {
                self.item_offset(pos + 1)
            } else {
                fss
            };
            if end < offset || end > fss {
                return Err(Error::corrupted(block, format!("item {} body out of bounds", pos)));
            }
            prev_end = end;
        }
        if prev_end != fss {
            return Err(Error::corrupted(block, "bytes between the last body and free space"));
        }
        Ok(())
    }
}
