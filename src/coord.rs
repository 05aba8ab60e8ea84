//! Coordinates: positions inside a node.
//!
//! A [`Coord`] names a node, an item, a unit inside the item and a
//! [`Between`] state telling whether it addresses the unit itself or a gap
//! next to it. Coordinates serve both as read cursors and as insertion
//! points.
//!
//! Navigation takes the node by reference and returns `false` when there is
//! no further position in the requested direction. The item kind is always
//! derived from the node on demand, so it can never disagree with the item
//! index.

use crate::common::NodeId;
use crate::item::ItemKind;
use crate::node::Node;

/// What part of the node a coordinate addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Between {
    /// The unit `(item, unit)` itself.
    AtUnit,
    /// The gap before unit `(item, unit)`.
    BeforeUnit,
    /// The gap after unit `(item, unit)`.
    AfterUnit,
    /// The gap before item `item`.
    BeforeItem,
    /// The gap after item `item`.
    AfterItem,
    /// The node has no items.
    EmptyNode,
    Invalid,
}

impl Between {
    /// Whether the state addresses a gap at item granularity.
    #[inline]
    fn is_item_level(self) -> bool {
        matches!(
            self,
            Between::BeforeItem | Between::AfterItem | Between::EmptyNode | Between::Invalid
        )
    }
}

/// A position inside a node.
///
/// # Example
/// ```
/// use fstree::coord::{Between, Coord};
/// use fstree::item::Item;
/// use fstree::node::Node;
/// use fstree::{BlockNr, Key, NodeFormat, NodeId};
///
/// let mut node = Node::new(BlockNr(1), 512, 1, NodeFormat::Plain, 0);
/// node.insert_item(0, &Item::tail(Key::file_body(1, 2, 0), b"ab".to_vec())).unwrap();
///
/// let mut coord = Coord::new(NodeId::new(0, 0));
/// coord.init_first_unit(&node);
/// assert!(coord.next_unit(&node));
/// assert_eq!(coord.unit, 1);
/// assert!(!coord.next_unit(&node));
/// assert_eq!(coord.between, Between::AfterItem);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Coord {
    pub node: NodeId,
    pub item: usize,
    pub unit: usize,
    pub between: Between,
}

impl Coord {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            item: 0,
            unit: 0,
            between: Between::Invalid,
        }
    }

    pub fn invalid() -> Self {
        Self::new(NodeId::INVALID)
    }

    fn set(&mut self, item: usize, unit: usize, between: Between) {
        self.item = item;
        self.unit = unit;
        self.between = between;
    }

    fn set_empty(&mut self) {
        self.set(0, 0, Between::EmptyNode);
    }

    fn last_unit(node: &Node, item: usize) -> usize {
        node.units(item).saturating_sub(1)
    }

    // ========================================================================
    // Initialisation
    // ========================================================================

    pub fn init_before_first_item(&mut self, node: &Node) {
        if node.is_empty() {
            self.set_empty();
        } else {
            self.set(0, 0, Between::BeforeItem);
        }
    }

    pub fn init_after_last_item(&mut self, node: &Node) {
        if node.is_empty() {
            self.set_empty();
        } else {
            self.set(node.items() - 1, 0, Between::AfterItem);
        }
    }

    pub fn init_first_unit(&mut self, node: &Node) {
        if node.is_empty() {
            self.set_empty();
        } else {
            self.set(0, 0, Between::AtUnit);
        }
    }

    pub fn init_last_unit(&mut self, node: &Node) {
        if node.is_empty() {
            self.set_empty();
        } else {
            let last = node.items() - 1;
            self.set(last, Self::last_unit(node, last), Between::AtUnit);
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Step to the next unit, crossing into the next item when needed.
    ///
    /// Past the last unit of the node the coordinate becomes `AfterItem` of
    /// the last item and `false` is returned.
    pub fn next_unit(&mut self, node: &Node) -> bool {
        let items = node.items();
        if items == 0 {
            self.set_empty();
            return false;
        }
        match self.between {
            Between::EmptyNode | Between::Invalid => false,
            Between::BeforeUnit | Between::BeforeItem => {
                if self.item >= items {
                    self.set(items - 1, 0, Between::AfterItem);
                    return false;
                }
                if self.between == Between::BeforeItem {
                    self.unit = 0;
                }
                self.between = Between::AtUnit;
                true
            }
            Between::AtUnit | Between::AfterUnit => {
                if self.unit < Self::last_unit(node, self.item) {
                    self.unit += 1;
                    self.between = Between::AtUnit;
                    true
                } else {
                    self.step_to_next_item(items)
                }
            }
            Between::AfterItem => self.step_to_next_item(items),
        }
    }

    fn step_to_next_item(&mut self, items: usize) -> bool {
        if self.item + 1 < items {
            self.set(self.item + 1, 0, Between::AtUnit);
            true
        } else {
            self.set(items - 1, 0, Between::AfterItem);
            false
        }
    }

    /// Step to the previous unit, crossing into the previous item when
    /// needed.
    ///
    /// Before the first unit the coordinate becomes `BeforeItem` of item 0
    /// and `false` is returned.
    pub fn prev_unit(&mut self, node: &Node) -> bool {
        let items = node.items();
        if items == 0 {
            self.set_empty();
            return false;
        }
        match self.between {
            Between::EmptyNode | Between::Invalid => false,
            Between::AfterUnit => {
                self.between = Between::AtUnit;
                true
            }
            Between::AfterItem => {
                let item = self.item.min(items - 1);
                self.set(item, Self::last_unit(node, item), Between::AtUnit);
                true
            }
            Between::AtUnit | Between::BeforeUnit => {
                if self.unit > 0 {
                    self.unit -= 1;
                    self.between = Between::AtUnit;
                    true
                } else {
                    self.step_to_prev_item(node)
                }
            }
            Between::BeforeItem => self.step_to_prev_item(node),
        }
    }

    fn step_to_prev_item(&mut self, node: &Node) -> bool {
        if self.item > 0 {
            let item = self.item - 1;
            self.set(item, Self::last_unit(node, item), Between::AtUnit);
            true
        } else {
            self.set(0, 0, Between::BeforeItem);
            false
        }
    }

    /// Step to unit 0 of the next item.
    pub fn next_item(&mut self, node: &Node) -> bool {
        let items = node.items();
        if items == 0 {
            self.set_empty();
            return false;
        }
        match self.between {
            Between::EmptyNode | Between::Invalid => false,
            Between::BeforeItem if self.item < items => {
                self.set(self.item, 0, Between::AtUnit);
                true
            }
            _ => self.step_to_next_item(items),
        }
    }

    /// Step to unit 0 of the previous item.
    pub fn prev_item(&mut self, node: &Node) -> bool {
        let items = node.items();
        if items == 0 {
            self.set_empty();
            return false;
        }
        match self.between {
            Between::EmptyNode | Between::Invalid => false,
            Between::AfterItem => {
                self.set(self.item.min(items - 1), 0, Between::AtUnit);
                true
            }
            _ if self.item > 0 => {
                self.set(self.item - 1, 0, Between::AtUnit);
                true
            }
            _ => {
                self.set(0, 0, Between::BeforeItem);
                false
            }
        }
    }

    /// Commit a gap position to the unit on its right.
    ///
    /// Returns `false` and leaves the coordinate untouched if there is none.
    pub fn set_to_right(&mut self, node: &Node) -> bool {
        let items = node.items();
        let target = match self.between {
            Between::AtUnit => return self.is_existing_unit(node),
            Between::EmptyNode | Between::Invalid => None,
            Between::BeforeUnit => Some((self.item, self.unit)),
            Between::BeforeItem => Some((self.item, 0)),
            Between::AfterUnit => {
                if self.unit < Self::last_unit(node, self.item) {
                    Some((self.item, self.unit + 1))
                } else {
                    Some((self.item + 1, 0))
                }
            }
            Between::AfterItem => Some((self.item + 1, 0)),
        };
        match target {
            Some((item, unit)) if item < items && unit < node.units(item) => {
                self.set(item, unit, Between::AtUnit);
                true
            }
            _ => false,
        }
    }

    /// Commit a gap position to the unit on its left.
    ///
    /// Returns `false` and leaves the coordinate untouched if there is none.
    pub fn set_to_left(&mut self, node: &Node) -> bool {
        let items = node.items();
        let target = match self.between {
            Between::AtUnit => return self.is_existing_unit(node),
            Between::EmptyNode | Between::Invalid => None,
            Between::AfterUnit => Some((self.item, self.unit)),
            Between::AfterItem if self.item < items => {
                Some((self.item, Self::last_unit(node, self.item)))
            }
            Between::AfterItem => None,
            Between::BeforeUnit if self.unit > 0 => Some((self.item, self.unit - 1)),
            Between::BeforeUnit | Between::BeforeItem => self
                .item
                .checked_sub(1)
                .filter(|item| *item < items)
                .map(|item| (item, Self::last_unit(node, item))),
        };
        match target {
            Some((item, unit)) if item < items && unit < node.units(item) => {
                self.set(item, unit, Between::AtUnit);
                true
            }
            _ => false,
        }
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    /// Whether the coordinate lies inside an item of `node`.
    pub fn is_existing_item(&self, node: &Node) -> bool {
        matches!(
            self.between,
            Between::AtUnit | Between::BeforeUnit | Between::AfterUnit
        ) && self.item < node.items()
    }

    /// Whether the coordinate addresses an existing unit of `node`.
    pub fn is_existing_unit(&self, node: &Node) -> bool {
        self.between == Between::AtUnit
            && self.item < node.items()
            && self.unit < node.units(self.item)
    }

    #[inline]
    pub fn is_between_items(&self) -> bool {
        matches!(
            self.between,
            Between::BeforeItem | Between::AfterItem | Between::EmptyNode
        )
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.between == Between::EmptyNode
    }

    pub fn is_leftmost_unit(&self, node: &Node) -> bool {
        self.is_existing_unit(node) && self.item == 0 && self.unit == 0
    }

    pub fn is_rightmost_unit(&self, node: &Node) -> bool {
        self.is_existing_unit(node)
            && self.item + 1 == node.items()
            && self.unit == Self::last_unit(node, self.item)
    }

    /// Whether nothing in `node` lies to the left of the coordinate.
    pub fn is_before_leftmost(&self, node: &Node) -> bool {
        match self.between {
            Between::EmptyNode => true,
            Between::BeforeItem => self.item == 0 || node.is_empty(),
            Between::BeforeUnit => self.item == 0 && self.unit == 0,
            _ => false,
        }
    }

    /// Whether nothing in `node` lies to the right of the coordinate.
    pub fn is_after_rightmost(&self, node: &Node) -> bool {
        match self.between {
            Between::EmptyNode => true,
            Between::AfterItem => self.item + 1 >= node.items(),
            Between::AfterUnit => {
                self.item + 1 == node.items() && self.unit == Self::last_unit(node, self.item)
            }
            _ => false,
        }
    }

    /// Kind of the item the coordinate lies in, read from `node`.
    pub fn item_kind(&self, node: &Node) -> Option<ItemKind> {
        if self.is_existing_item(node) {
            node.item_kind(self.item).ok()
        } else {
            None
        }
    }
}

impl PartialEq for Coord {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
            && self.item == other.item
            && self.between == other.between
            && (self.unit == other.unit || self.between.is_item_level())
    }
}

impl Eq for Coord {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BlockNr, Key, NodeFormat};
    use crate::item::{Item, StatData};
    use proptest::prelude::*;

    fn node_with(tails: &[usize]) -> Node {
        let mut node = Node::new(BlockNr(1), 1024, 1, NodeFormat::Plain, 0);
        for (i, len) in tails.iter().enumerate() {
            let item = if *len == 0 {
                Item::stat_data(Key::stat_data(1, i as u64 + 1), StatData::default())
            } else {
                Item::tail(Key::file_body(1, i as u64 + 1, 0), vec![b'x'; *len])
            };
            node.insert_item(i, &item).unwrap();
        }
        node
    }

    fn coord() -> Coord {
        Coord::new(NodeId::new(0, 0))
    }

    #[test]
    fn test_empty_node_positions() {
        let node = node_with(&[]);
        let mut c = coord();
        c.init_first_unit(&node);
        assert!(c.is_empty());
        assert!(!c.next_unit(&node));
        assert!(!c.prev_item(&node));
        assert!(c.is_before_leftmost(&node) && c.is_after_rightmost(&node));
        assert!(!c.set_to_right(&node));
    }

    #[test]
    fn test_next_unit_crosses_items() {
        let node = node_with(&[2, 0]);
        let mut c = coord();
        c.init_before_first_item(&node);
        let mut seen = Vec::new();
        while c.next_unit(&node) {
            seen.push((c.item, c.unit));
        }
        assert_eq!(seen, vec![(0, 0), (0, 1), (1, 0)]);
        assert_eq!((c.item, c.between), (1, Between::AfterItem));
        assert!(c.is_after_rightmost(&node));
    }

    #[test]
    fn test_prev_unit_crosses_items() {
        let node = node_with(&[0, 3]);
        let mut c = coord();
        c.init_after_last_item(&node);
        let mut seen = Vec::new();
        while c.prev_unit(&node) {
            seen.push((c.item, c.unit));
        }
        assert_eq!(seen, vec![(1, 2), (1, 1), (1, 0), (0, 0)]);
        assert_eq!((c.item, c.between), (0, Between::BeforeItem));
        assert!(c.is_before_leftmost(&node));
    }

    #[test]
    fn test_item_steps() {
        let node = node_with(&[3, 2, 0]);
        let mut c = coord();
        c.init_first_unit(&node);
        assert!(c.next_item(&node));
        assert_eq!((c.item, c.unit), (1, 0));
        assert!(c.next_item(&node));
        assert!(!c.next_item(&node));
        assert_eq!(c.between, Between::AfterItem);
        assert!(c.prev_item(&node));
        assert_eq!((c.item, c.between), (2, Between::AtUnit));
        assert!(c.prev_item(&node) && c.prev_item(&node));
        assert!(!c.prev_item(&node));
        assert_eq!(c.between, Between::BeforeItem);
    }

    #[test]
    fn test_set_to_right_and_left() {
        let node = node_with(&[2, 2]);
        let mut c = coord();
        c.set(0, 1, Between::AfterUnit);
        let mut right = c;
        assert!(right.set_to_right(&node));
        assert_eq!((right.item, right.unit, right.between), (1, 0, Between::AtUnit));
        let mut left = c;
        assert!(left.set_to_left(&node));
        assert_eq!((left.item, left.unit), (0, 1));

        c.set(0, 0, Between::BeforeItem);
        let before = c;
        assert!(!c.set_to_left(&node));
        assert_eq!(c, before);

        c.set(1, 0, Between::AfterItem);
        assert!(!c.set_to_right(&node));
        assert!(c.set_to_left(&node));
        assert_eq!((c.item, c.unit), (1, 1));
    }

    #[test]
    fn test_predicates() {
        let node = node_with(&[2, 0]);
        let mut c = coord();
        c.init_first_unit(&node);
        assert!(c.is_existing_item(&node) && c.is_existing_unit(&node));
        assert!(c.is_leftmost_unit(&node) && !c.is_rightmost_unit(&node));
        assert_eq!(c.item_kind(&node), Some(ItemKind::Tail));

        c.init_last_unit(&node);
        assert!(c.is_rightmost_unit(&node));
        assert_eq!(c.item_kind(&node), Some(ItemKind::StatData));

        c.init_after_last_item(&node);
        assert!(c.is_between_items() && !c.is_existing_item(&node));
        assert_eq!(c.item_kind(&node), None);
    }

    #[test]
    fn test_equality_ignores_unit_between_items() {
        let mut a = coord();
        let mut b = coord();
        a.set(1, 0, Between::AfterItem);
        b.set(1, 5, Between::AfterItem);
        assert_eq!(a, b);

        a.set(1, 0, Between::AtUnit);
        b.set(1, 5, Between::AtUnit);
        assert_ne!(a, b);

        b.set(1, 0, Between::BeforeUnit);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_next_unit_ends_after_last_item(
            tails in proptest::collection::vec(0usize..6, 0..6),
            start in 0usize..4,
        ) {
            let node = node_with(&tails);
            let mut c = coord();
            match start {
                0 => c.init_before_first_item(&node),
                1 => c.init_first_unit(&node),
                2 => c.init_last_unit(&node),
                _ => c.init_after_last_item(&node),
            }
            let total: usize = (0..node.items()).map(|i| node.units(i)).sum();
            let mut steps = 0;
            while c.next_unit(&node) {
                steps += 1;
                prop_assert!(steps <= total);
                prop_assert!(c.is_existing_unit(&node));
            }
            if node.is_empty() {
                prop_assert_eq!(c.between, Between::EmptyNode);
            } else {
                prop_assert_eq!(c.between, Between::AfterItem);
                prop_assert_eq!(c.item, node.items() - 1);
                // Further calls stay put.
                let end = c;
                prop_assert!(!c.next_unit(&node));
                prop_assert_eq!(c, end);
            }
        }
    }
}
