//! Tree nodes in the node40 layout.
//!
//! - [`Node`] - a block-sized buffer holding items of one level
//! - [`NodeHeader`] / [`ItemHeader`] - on-disk header formats
//! - [`ShiftHint`] - parameters and results of moving data between siblings
//!
//! Everything in this module works on a single node (or a pair of siblings
//! for shifts). Tree-level bookkeeping such as delimiting keys and parent
//! pointers is the caller's job.

mod check;
mod header;
mod node40;
mod shift;

pub use header::{ItemHeader, NodeHeader};
pub use node40::Node;
pub use shift::{Direction, ShiftHint};

/// How a lookup treats a key that is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Stop at the insertion point of the key.
    Exact,
    /// Stop at the unit with the greatest key not above the key.
    Nearest,
}

/// Outcome of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Present,
    Absent,
}

/// Where new data goes inside a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    /// A new item before item `item`.
    Gap { item: usize },
    /// Units pasted into item `item` before unit `unit`.
    Paste { item: usize, unit: usize },
}

impl InsertPoint {
    /// Item index the point refers to.
    #[inline]
    pub fn item(&self) -> usize {
        match *self {
            InsertPoint::Gap { item } | InsertPoint::Paste { item, .. } => item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::format::ITEM_HEADER_SIZE as IH;
    use crate::common::{BlockNr, Error, Key, NodeFormat};
    use crate::coord::{Between, Coord};
    use crate::item::{DirEntry, ExtentUnit, Item, StatData};
    use crate::NodeId;
    use proptest::prelude::*;

    const SIZE: usize = 512;

    fn leaf() -> Node {
        Node::new(BlockNr(7), SIZE, 1, NodeFormat::Plain, 0)
    }

    fn sd(oid: u64) -> Item {
        Item::stat_data(Key::stat_data(1, oid), StatData::default())
    }

    fn tail(oid: u64, offset: u64, bytes: &[u8]) -> Item {
        Item::tail(Key::file_body(1, oid, offset), bytes.to_vec())
    }

    fn accounting_holds(node: &Node) -> bool {
        node.free_space_start() + node.free_space() + node.items() * IH == node.size()
    }

    fn lookup(node: &Node, key: &Key, bias: Bias) -> (Lookup, Coord) {
        let mut coord = Coord::new(NodeId::new(0, 0));
        let found = node.lookup(key, bias, &mut coord).unwrap();
        (found, coord)
    }

    #[test]
    fn test_new_node_is_empty() {
        let node = leaf();
        assert!(node.is_empty());
        assert!(node.is_leaf());
        assert_eq!(node.free_space(), SIZE - 28);
        assert!(accounting_holds(&node));
        assert!(node.check().is_ok());
    }

    #[test]
    fn test_checksummed_body_starts_after_crc() {
        let node = Node::new(BlockNr(1), SIZE, 1, NodeFormat::Checksummed, 0);
        assert_eq!(node.body_start(), 32);
        assert_eq!(node.free_space(), SIZE - 32);
    }

    #[test]
    fn test_expand_and_shrink_keep_accounting() {
        let mut node = leaf();
        node.insert_item(0, &sd(1)).unwrap();
        node.insert_item(1, &sd(3)).unwrap();
        let free = node.free_space();

        node.expand(1, 10, 2);
        assert_eq!(node.items(), 4);
        assert_eq!(node.free_space(), free - 10 - 2 * IH);
        assert!(accounting_holds(&node));

        node.shrink(1, 10, 2);
        assert_eq!(node.items(), 2);
        assert_eq!(node.free_space(), free);
        assert_eq!(node.item(1).unwrap(), sd(3));

        node.expand(0, 6, 0);
        assert_eq!(node.item_length(0), StatData::SIZE + 6);
        node.shrink(0, 6, 0);
        assert_eq!(node.item(0).unwrap(), sd(1));
        assert!(accounting_holds(&node));
    }

    #[test]
    fn test_insert_keeps_items_sorted() {
        let mut node = leaf();
        for oid in [5, 1, 3] {
            let mut coord = Coord::new(NodeId::new(0, 0));
            let item = sd(oid);
            node.lookup(&item.key, Bias::Exact, &mut coord).unwrap();
            let point = node.resolve_place(&coord, &item).unwrap();
            node.insert(point, &item).unwrap();
        }
        let keys: Vec<u64> = (0..node.items()).map(|i| node.key_at(i).objectid()).collect();
        assert_eq!(keys, vec![1, 3, 5]);
        assert!(node.check().is_ok());
    }

    #[test]
    fn test_insert_rejects_overflow() {
        let mut node = leaf();
        let big = tail(1, 0, &vec![0xAA; SIZE - 28 - IH + 1]);
        assert!(matches!(node.insert_item(0, &big), Err(Error::NoSpace)));
        let exact = tail(1, 0, &vec![0xAA; SIZE - 28 - IH]);
        node.insert_item(0, &exact).unwrap();
        assert_eq!(node.free_space(), 0);
    }

    #[test]
    fn test_lookup_positions() {
        let mut node = leaf();
        // Stat data sorts before file bodies of the same locality.
        node.insert_item(0, &sd(1)).unwrap();
        node.insert_item(1, &sd(9)).unwrap();
        node.insert_item(2, &tail(1, 100, b"abcd")).unwrap();

        let (found, coord) = lookup(&node, &Key::stat_data(1, 1), Bias::Exact);
        assert_eq!(found, Lookup::Present);
        assert_eq!((coord.item, coord.between), (0, Between::AtUnit));

        let (found, coord) = lookup(&node, &Key::file_body(1, 1, 102), Bias::Exact);
        assert_eq!(found, Lookup::Present);
        assert_eq!((coord.item, coord.unit), (2, 2));

        let (found, coord) = lookup(&node, &Key::file_body(1, 1, 104), Bias::Exact);
        assert_eq!(found, Lookup::Absent);
        assert_eq!((coord.item, coord.unit, coord.between), (2, 3, Between::AfterUnit));

        let (found, coord) = lookup(&node, &Key::file_body(1, 1, 104), Bias::Nearest);
        assert_eq!(found, Lookup::Absent);
        assert_eq!((coord.item, coord.unit, coord.between), (2, 3, Between::AtUnit));

        let (found, coord) = lookup(&node, &Key::stat_data(1, 0), Bias::Exact);
        assert_eq!(found, Lookup::Absent);
        assert_eq!((coord.item, coord.between), (0, Between::BeforeItem));

        let (_, coord) = lookup(&node, &Key::stat_data(1, 20), Bias::Exact);
        assert_eq!((coord.item, coord.between), (1, Between::AfterItem));

        let (_, coord) = lookup(&node, &Key::file_body(1, 2, 0), Bias::Exact);
        assert_eq!((coord.item, coord.between), (2, Between::AfterItem));

        let (_, coord) = lookup(&leaf(), &Key::stat_data(1, 20), Bias::Exact);
        assert_eq!(coord.between, Between::EmptyNode);
    }

    #[test]
    fn test_appending_tail_pastes_into_previous_item() {
        let mut node = leaf();
        node.insert_item(0, &tail(1, 0, b"abc")).unwrap();

        let more = tail(1, 3, b"de");
        let (_, coord) = lookup(&node, &more.key, Bias::Exact);
        let point = node.resolve_place(&coord, &more).unwrap();
        assert_eq!(point, InsertPoint::Paste { item: 0, unit: 3 });
        assert_eq!(Node::space_for(point, &more), 2);

        node.insert(point, &more).unwrap();
        assert_eq!(node.items(), 1);
        assert_eq!(node.item(0).unwrap(), tail(1, 0, b"abcde"));
    }

    #[test]
    fn test_prepending_tail_rekeys_item() {
        let mut node = leaf();
        node.insert_item(0, &tail(1, 2, b"cd")).unwrap();
        let front = tail(1, 0, b"ab");
        assert_eq!(node.place_in_gap(0, &front), InsertPoint::Paste { item: 0, unit: 0 });
        node.insert(InsertPoint::Paste { item: 0, unit: 0 }, &front).unwrap();
        assert_eq!(node.key_at(0).offset(), 0);
        assert_eq!(node.item(0).unwrap(), tail(1, 0, b"abcd"));
    }

    #[test]
    fn test_existing_unit_is_rejected() {
        let mut node = leaf();
        node.insert_item(0, &sd(1)).unwrap();
        let (_, coord) = lookup(&node, &Key::stat_data(1, 1), Bias::Exact);
        assert!(matches!(
            node.resolve_place(&coord, &sd(1)),
            Err(Error::AlreadyExists)
        ));
    }

    #[test]
    fn test_remove_units_and_items() {
        let mut node = leaf();
        node.insert_item(0, &tail(1, 0, b"abcdef")).unwrap();
        node.remove(0, 0, 2).unwrap();
        assert_eq!(node.item(0).unwrap(), tail(1, 2, b"cdef"));

        node.truncate(0, 2).unwrap();
        assert_eq!(node.item(0).unwrap(), tail(1, 2, b"cd"));

        node.remove(0, 0, 2).unwrap();
        assert!(node.is_empty());
        assert_eq!(node.free_space(), SIZE - 28);
        assert!(node.remove(0, 0, 1).is_err());
    }

    #[test]
    fn test_write_keeps_size() {
        let mut node = leaf();
        node.insert_item(0, &tail(1, 0, b"abcdef")).unwrap();
        node.write(0, 2, &tail(1, 2, b"XY")).unwrap();
        assert_eq!(node.item(0).unwrap(), tail(1, 0, b"abXYef"));
        assert!(node.write(0, 5, &tail(1, 5, b"XY")).is_err());
    }

    #[test]
    fn test_merge_adjacent_items() {
        let mut node = leaf();
        let first = Item::extent(Key::file_body(1, 4, 0), vec![ExtentUnit { start: 10, width: 1 }]);
        let second = Item::extent(
            Key::file_body(1, 4, 4096),
            vec![ExtentUnit { start: 11, width: 2 }],
        );
        node.insert_item(0, &first).unwrap();
        node.insert_item(1, &second).unwrap();
        node.merge(0, 1).unwrap();
        assert_eq!(node.items(), 1);
        assert_eq!(node.units(0), 2);
        assert!(node.merge(0, 1).is_err());
    }

    #[test]
    fn test_dir_entries_merge_into_one_item() {
        let mut node = leaf();
        let a = Item::dir_entry(DirEntry::new(10, b"a", 1, 20, 0).unwrap());
        let b = Item::dir_entry(DirEntry::new(10, b"b", 1, 21, 0).unwrap());
        node.insert_item(0, &a).unwrap();
        let point = node.place_in_gap(1, &b);
        assert_eq!(point, InsertPoint::Paste { item: 0, unit: 1 });
        node.insert(point, &b).unwrap();
        assert_eq!(node.units(0), 2);
        assert!(node.check().is_ok());
    }

    #[test]
    fn test_seal_and_reload_checksummed() {
        let mut node = Node::new(BlockNr(3), SIZE, 1, NodeFormat::Checksummed, 0xBEEF);
        node.insert_item(0, &sd(1)).unwrap();
        node.seal(9);

        let loaded = Node::from_bytes(BlockNr(3), node.as_bytes().into()).unwrap();
        assert_eq!(loaded.flush_id(), 9);
        assert_eq!(loaded.mkfs_id(), 0xBEEF);
        assert_eq!(loaded.item(0).unwrap(), sd(1));

        let mut bytes: Box<[u8]> = node.as_bytes().into();
        bytes[100] ^= 0xFF;
        assert!(matches!(
            Node::from_bytes(BlockNr(3), bytes),
            Err(Error::Corrupted { .. })
        ));
    }

    #[test]
    fn test_from_bytes_rejects_bad_magic() {
        let node = leaf();
        let mut bytes: Box<[u8]> = node.as_bytes().into();
        bytes[8] = 0;
        assert!(Node::from_bytes(BlockNr(7), bytes).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_bad_item_offsets() {
        let mut node = leaf();
        node.insert_item(0, &sd(1)).unwrap();
        node.insert_item(1, &sd(2)).unwrap();
        let second = SIZE - 2 * IH + ItemHeader::OFFSET_BODY;

        for offset in [0xFFFFu16, 0, (SIZE - 1) as u16] {
            let mut bytes: Box<[u8]> = node.as_bytes().into();
            bytes[second..second + 2].copy_from_slice(&offset.to_le_bytes());
            assert!(matches!(
                Node::from_bytes(BlockNr(7), bytes),
                Err(Error::Corrupted { .. })
            ));
        }
        assert!(Node::from_bytes(BlockNr(7), node.as_bytes().into()).is_ok());
    }

    proptest! {
        #[test]
        fn prop_random_inserts_keep_node_valid(oids in proptest::collection::btree_set(1u64..500, 1..8)) {
            let mut node = leaf();
            for oid in &oids {
                let item = sd(*oid);
                let mut coord = Coord::new(NodeId::new(0, 0));
                node.lookup(&item.key, Bias::Exact, &mut coord).unwrap();
                let point = node.resolve_place(&coord, &item).unwrap();
                node.insert(point, &item).unwrap();
                prop_assert!(accounting_holds(&node));
            }
            prop_assert_eq!(node.items(), oids.len());
            prop_assert!(node.check().is_ok());
            for (i, oid) in oids.iter().enumerate() {
                prop_assert_eq!(node.key_at(i).objectid(), *oid);
            }
        }
    }
}
