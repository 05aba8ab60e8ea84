//! Whole-tree validation.

use super::Tree;
use crate::common::{Error, Key, NodeId, Result};

impl Tree {
    /// Validate the structure of the whole tree.
    ///
    /// - the root sits on level `height`
    /// - every node passes [`Node::check`](crate::node::Node::check)
    /// - children sit one level below their parent and are not empty
    /// - each delimiting key equals the leftmost key of its child
    /// - keys ascend across leaves
    /// - every node block is allocated
    ///
    /// Loads every node into the cache.
    pub fn check(&mut self) -> Result<()> {
        let Some(root) = self.root else {
            if self.height != 0 {
                return Err(Error::corrupted(0, "empty tree with a height"));
            }
            return Ok(());
        };
        let node = self.node(root)?;
        if node.level() != self.height {
            return Err(Error::corrupted(
                node.block().0,
                format!("root on level {}, tree height {}", node.level(), self.height),
            ));
        }
        let mut last = None;
        self.check_subtree(root, &mut last)
    }

    fn check_subtree(&mut self, id: NodeId, last: &mut Option<Key>) -> Result<()> {
        let node = self.node(id)?;
        node.check()?;
        let block = node.block();
        if !self.allocator.is_used(block) {
            return Err(Error::corrupted(block.0, "node block is free"));
        }

        if node.is_leaf() {
            for pos in 0..node.items() {
                let item = node.item(pos)?;
                if let Some(prev) = last {
                    if *prev >= item.key {
                        return Err(Error::corrupted(
                            block.0,
                            format!("item {} overlaps the key {}", pos, prev),
                        ));
                    }
                }
                *last = Some(item.maxreal_key());
            }
            return Ok(());
        }

        if node.is_empty() {
            return Err(Error::corrupted(block.0, "internal node without items"));
        }
        for pos in 0..node.items() {
            let child = self.load_child(id, pos)?;
            let delimiting = self.node(id)?.key_at(pos);
            let child_node = self.node(child)?;
            match child_node.leftmost_key() {
                None => {
                    return Err(Error::corrupted(child_node.block().0, "empty child node"));
                }
                Some(key) if key != delimiting => {
                    return Err(Error::corrupted(
                        block.0,
                        format!("delimiting key {} of child {} is not {}", delimiting, pos, key),
                    ));
                }
                Some(_) => {}
            }
            self.check_subtree(child, last)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::common::Key;
    use crate::item::Item;
    use crate::tree::tests::small_tree;

    #[test]
    fn test_check_empty_and_populated_tree() {
        let mut tree = small_tree();
        tree.check().unwrap();
        for oid in 0..100u64 {
            tree.insert(&Item::tail(Key::file_body(oid % 3, oid, 0), vec![1; 9]))
                .unwrap();
        }
        tree.check().unwrap();
    }

    #[test]
    fn test_check_detects_bad_delimiting_key() {
        let mut tree = small_tree();
        for oid in 0..60u64 {
            tree.insert(&Item::tail(Key::file_body(1, oid, 0), vec![1; 9]))
                .unwrap();
        }
        let root = tree.root().unwrap();
        assert!(tree.node(root).unwrap().items() > 1);
        tree.node_mut(root)
            .unwrap()
            .set_key_at(1, &Key::file_body(1, 0, 5));
        assert!(tree.check().is_err());
    }
}
