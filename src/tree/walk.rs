//! Depth-first traversal.

use super::Tree;
use crate::common::{NodeId, Result};
use crate::node::Node;

/// Callbacks for [`Tree::walk`].
///
/// Nodes are visited depth first, children in key order.
pub trait TreeVisitor {
    /// Called when a node is entered. Returning `false` skips its children.
    fn before(&mut self, node: &Node) -> Result<bool>;

    /// Called on a parent after the subtree of child `pos` was walked.
    fn update(&mut self, _parent: &Node, _pos: usize) -> Result<()> {
        Ok(())
    }

    /// Called when a node is left.
    fn after(&mut self, _node: &Node) -> Result<()> {
        Ok(())
    }
}

impl Tree {
    /// Visit every node of the tree. The first error stops the walk.
    pub fn walk<V: TreeVisitor>(&mut self, visitor: &mut V) -> Result<()> {
        self.maybe_evict(None)?;
        match self.root {
            Some(root) => self.walk_node(root, visitor),
            None => Ok(()),
        }
    }

    fn walk_node<V: TreeVisitor>(&mut self, id: NodeId, visitor: &mut V) -> Result<()> {
        let node = self.node(id)?;
        if visitor.before(node)? && !node.is_leaf() {
            for pos in 0..node.items() {
                let child = self.load_child(id, pos)?;
                self.walk_node(child, visitor)?;
                visitor.update(self.node(id)?, pos)?;
            }
        }
        visitor.after(self.node(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Key;
    use crate::item::Item;
    use crate::tree::tests::small_tree;

    #[derive(Default)]
    struct Census {
        leaves: usize,
        internal: usize,
        items: Vec<Key>,
        updates: usize,
    }

    impl TreeVisitor for Census {
        fn before(&mut self, node: &Node) -> Result<bool> {
            if node.is_leaf() {
                self.leaves += 1;
                self.items.extend((0..node.items()).map(|pos| node.key_at(pos)));
            } else {
                self.internal += 1;
            }
            Ok(true)
        }

        fn update(&mut self, _parent: &Node, _pos: usize) -> Result<()> {
            self.updates += 1;
            Ok(())
        }
    }

    struct RootOnly(usize);

    impl TreeVisitor for RootOnly {
        fn before(&mut self, _node: &Node) -> Result<bool> {
            self.0 += 1;
            Ok(false)
        }
    }

    #[test]
    fn test_walk_visits_items_in_order() {
        let mut tree = small_tree();
        for oid in (0..80u64).rev() {
            tree.insert(&Item::tail(Key::file_body(9, oid, 0), vec![0; 16]))
                .unwrap();
        }
        let mut census = Census::default();
        tree.walk(&mut census).unwrap();

        assert!(census.leaves > 1);
        assert_eq!(census.updates, census.leaves + census.internal - 1);
        let mut sorted = census.items.clone();
        sorted.sort();
        assert_eq!(census.items, sorted);
        assert_eq!(census.items.first(), Some(&Key::file_body(9, 0, 0)));
    }

    #[test]
    fn test_walk_can_skip_children() {
        let mut tree = small_tree();
        for oid in 0..80u64 {
            tree.insert(&Item::tail(Key::file_body(9, oid, 0), vec![0; 16]))
                .unwrap();
        }
        let mut visitor = RootOnly(0);
        tree.walk(&mut visitor).unwrap();
        assert_eq!(visitor.0, 1);
    }
}
