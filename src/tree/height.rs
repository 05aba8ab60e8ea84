//! Changing the height of the tree at the root.

use tracing::debug;

use super::{ParentLink, Tree};
use crate::common::format::{MAX_TREE_HEIGHT, MIN_TREE_HEIGHT};
use crate::common::{Error, Key, Result};
use crate::item::Item;

impl Tree {
    /// Add a level: a new root with a single pointer to the old one.
    ///
    /// # Errors
    /// - `Error::NoSpace` at the maximal height or without free blocks
    /// - `Error::InvalidArgument` for an empty tree
    pub(crate) fn growup(&mut self) -> Result<()> {
        let old = self.root.ok_or_else(|| Error::invalid("empty tree cannot grow"))?;
        if self.height >= MAX_TREE_HEIGHT {
            return Err(Error::NoSpace);
        }
        let (key, block) = {
            let node = self.node(old)?;
            (node.leftmost_key().unwrap_or_else(Key::minimal), node.block())
        };

        let root = self.alloc_node(self.height + 1)?;
        self.node_mut(root)?.insert_item(0, &Item::node_ptr(key, block))?;
        self.cache.get_mut(old)?.parent = Some(ParentLink { node: root, pos: 0 });
        self.root = Some(root);
        self.height += 1;
        debug!(height = self.height, "tree grew");
        Ok(())
    }

    /// Remove a level: the only child of the root becomes the root.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` unless the tree is taller than
    /// `MIN_TREE_HEIGHT` and the root holds exactly one pointer.
    pub(crate) fn dryout(&mut self) -> Result<()> {
        let old = self.root.ok_or_else(|| Error::invalid("empty tree cannot shrink"))?;
        if self.height <= MIN_TREE_HEIGHT || self.node(old)?.items() != 1 {
            return Err(Error::invalid(format!(
                "cannot dry out a root of height {} with {} items",
                self.height,
                self.node(old)?.items()
            )));
        }
        let child = self.load_child(old, 0)?;
        self.cache.get_mut(child)?.parent = None;
        self.root = Some(child);
        self.height -= 1;
        self.discard_node(old)?;
        self.cache.forget_siblings();
        debug!(height = self.height, "tree dried out");
        Ok(())
    }

    /// Dry out while the root holds a single pointer.
    pub(crate) fn shrink_root(&mut self) -> Result<()> {
        while let Some(root) = self.root {
            if self.height <= MIN_TREE_HEIGHT || self.node(root)?.items() != 1 {
                break;
            }
            self.dryout()?;
        }
        Ok(())
    }
}
