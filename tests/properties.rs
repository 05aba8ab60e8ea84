//! Property tests: the tree against an in-memory model.

use std::collections::BTreeMap;

use fstree::item::{DirEntry, Item, ItemBody, StatData};
use fstree::storage::MemoryDevice;
use fstree::{Error, Key, Tree, TreeConfig};
use proptest::prelude::*;

fn create_tree() -> Tree {
    let config = TreeConfig {
        node_size: 256,
        cache_capacity: 64,
        block_count: 4096,
        ..TreeConfig::default()
    };
    Tree::create(config, MemoryDevice::new(256)).unwrap()
}

fn sd(locality: u64, oid: u64, size: u64) -> Item {
    Item::stat_data(
        Key::stat_data(locality, oid),
        StatData {
            size,
            ..StatData::default()
        },
    )
}

#[derive(Debug, Clone)]
enum Op {
    Insert(u64, u64, u64),
    Remove(u64, u64),
}

#[derive(Debug, Clone)]
enum EntryOp {
    Add(u64, usize, u64),
    Remove(u64, usize),
}

const NAMES: usize = 12;

/// Even slots hold names packed into the key, odd slots names stored in
/// the entry body.
fn entry_name(slot: usize) -> Vec<u8> {
    if slot % 2 == 0 {
        format!("n{}", slot).into_bytes()
    } else {
        format!("a-longer-entry-name-{}", slot).into_bytes()
    }
}

fn entry_op_strategy() -> impl Strategy<Value = EntryOp> {
    prop_oneof![
        3 => (0u64..3, 0..NAMES, 1u64..1000).prop_map(|(d, n, t)| EntryOp::Add(d, n, t)),
        1 => (0u64..3, 0..NAMES).prop_map(|(d, n)| EntryOp::Remove(d, n)),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..4, 0u64..64, any::<u64>()).prop_map(|(l, o, s)| Op::Insert(l, o, s)),
        1 => (0u64..4, 0u64..64).prop_map(|(l, o)| Op::Remove(l, o)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Test that lookups agree with a BTreeMap after random inserts and removals.
    #[test]
    fn test_matches_model(ops in prop::collection::vec(op_strategy(), 1..300)) {
        let mut tree = create_tree();
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(l, o, s) => {
                    let result = tree.insert(&sd(l, o, s));
                    if model.contains_key(&(l, o)) {
                        prop_assert!(matches!(result, Err(Error::AlreadyExists)));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert((l, o), s);
                    }
                }
                Op::Remove(l, o) => {
                    let result = tree.remove_key(&Key::stat_data(l, o));
                    if model.remove(&(l, o)).is_some() {
                        prop_assert!(result.is_ok());
                    } else {
                        prop_assert!(matches!(result, Err(Error::NotFound)));
                    }
                }
            }
        }

        tree.check().unwrap();
        for l in 0..4u64 {
            for o in 0..64u64 {
                let stored = tree.get(&Key::stat_data(l, o)).unwrap();
                let expected = model.get(&(l, o)).map(|&s| sd(l, o, s));
                prop_assert_eq!(stored, expected);
            }
        }
    }

    /// Test that iterating from the first unit yields the model's keys in order.
    #[test]
    fn test_iteration_order(keys in prop::collection::btree_set((0u64..8, 0u64..200), 1..150)) {
        let mut tree = create_tree();
        for &(l, o) in keys.iter().rev() {
            tree.insert(&sd(l, o, o)).unwrap();
        }

        let mut seen = Vec::new();
        let mut coord = tree.first().unwrap().unwrap();
        loop {
            seen.push(tree.fetch_unit(&coord).unwrap().key);
            if !tree.step_right(&mut coord).unwrap() {
                break;
            }
        }
        let expected: Vec<Key> = keys.iter().map(|&(l, o)| Key::stat_data(l, o)).collect();
        prop_assert_eq!(seen, expected);
    }

    /// Test that the height never drops while only inserting.
    #[test]
    fn test_height_grows_monotonically(oids in prop::collection::vec(0u64..10_000, 1..200)) {
        let mut tree = create_tree();
        let mut height = tree.height();
        for oid in oids {
            let _ = tree.insert(&sd(1, oid, 0));
            prop_assert!(tree.height() >= height);
            height = tree.height();
        }
        tree.check().unwrap();
    }

    /// Test that tail bytes survive being split across leaves.
    #[test]
    fn test_tail_bytes_survive_shifts(lens in prop::collection::vec(1usize..120, 1..40)) {
        let mut tree = create_tree();
        // Interleave the order so later items land between earlier ones.
        let order: Vec<usize> = (0..lens.len()).step_by(2).chain((1..lens.len()).step_by(2)).collect();
        for &oid in &order {
            let bytes: Vec<u8> = (0..lens[oid]).map(|i| (oid + i) as u8).collect();
            tree.insert(&Item::tail(Key::file_body(7, oid as u64, 0), bytes)).unwrap();
        }
        tree.check().unwrap();

        for (oid, &len) in lens.iter().enumerate() {
            for offset in [0, len / 2, len - 1] {
                let unit = tree
                    .get(&Key::file_body(7, oid as u64, offset as u64))
                    .unwrap()
                    .unwrap();
                match unit.body {
                    ItemBody::Tail(tail) => prop_assert_eq!(tail.0, vec![(oid + offset) as u8]),
                    other => prop_assert!(false, "unexpected body {:?}", other),
                }
            }
            prop_assert!(tree.get(&Key::file_body(7, oid as u64, len as u64)).unwrap().is_none());
        }
    }

    /// Test that directory entries agree with a model, including names whose
    /// keys are already taken by another entry.
    #[test]
    fn test_entries_match_model(ops in prop::collection::vec(entry_op_strategy(), 1..80)) {
        let mut tree = create_tree();
        let mut model: BTreeMap<(u64, usize), u64> = BTreeMap::new();

        // Occupy generation 0 of some long names so that adding them has to
        // walk the collision run.
        for dir in 0..3u64 {
            for slot in (1..NAMES).step_by(4) {
                let squatter = DirEntry {
                    key: DirEntry::entry_key(dir, &entry_name(slot), 0).unwrap(),
                    name: format!("occupied-slot-{}", slot).into_bytes(),
                    target_locality: dir,
                    target_objectid: 0,
                };
                tree.insert(&Item::dir_entry(squatter)).unwrap();
            }
        }

        for op in ops {
            match op {
                EntryOp::Add(dir, slot, target) => {
                    let result = tree.add_entry(dir, &entry_name(slot), dir, target);
                    if model.contains_key(&(dir, slot)) {
                        prop_assert!(matches!(result, Err(Error::AlreadyExists)));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert((dir, slot), target);
                    }
                }
                EntryOp::Remove(dir, slot) => {
                    let result = tree.remove_entry(dir, &entry_name(slot));
                    if model.remove(&(dir, slot)).is_some() {
                        prop_assert!(result.is_ok());
                    } else {
                        prop_assert!(matches!(result, Err(Error::NotFound)));
                    }
                }
            }

            for dir in 0..3u64 {
                for slot in 0..NAMES {
                    let found = tree.find_entry(dir, &entry_name(slot)).unwrap();
                    let target = found.map(|(_, entry)| entry.target_objectid);
                    prop_assert_eq!(target, model.get(&(dir, slot)).copied());
                }
            }
            tree.check().unwrap();
        }
    }
}
