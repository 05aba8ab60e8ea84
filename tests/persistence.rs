//! Integration tests for trees stored in files.
//!
//! These tests verify that a synced tree reopens with the same content and
//! a consistent block allocation.

use fstree::item::{Item, StatData};
use fstree::storage::DiskManager;
use fstree::{Error, Key, NodeFormat, Tree, TreeConfig};
use tempfile::tempdir;

const NODE_SIZE: usize = 512;

fn config(format: NodeFormat) -> TreeConfig {
    TreeConfig {
        node_size: NODE_SIZE,
        format,
        cache_capacity: 32,
        block_count: 2048,
        ..TreeConfig::default()
    }
}

fn sd(oid: u64) -> Item {
    Item::stat_data(
        Key::stat_data(1, oid),
        StatData {
            size: oid * 10,
            ..StatData::default()
        },
    )
}

/// Test that items survive a sync and reopen.
#[test]
fn test_reopen_after_sync() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.img");

    let (height, free) = {
        let mut tree = Tree::create(
            config(NodeFormat::Plain),
            DiskManager::create(&path, NODE_SIZE).unwrap(),
        )
        .unwrap();
        for oid in 0..300 {
            tree.insert(&sd(oid)).unwrap();
        }
        tree.add_entry(1, b"notes.txt", 1, 7).unwrap();
        tree.sync().unwrap();
        (tree.height(), tree.free_blocks())
    };

    let mut tree = Tree::open(
        config(NodeFormat::Plain),
        DiskManager::open(&path, NODE_SIZE).unwrap(),
    )
    .unwrap();
    assert_eq!(tree.height(), height);
    assert_eq!(tree.free_blocks(), free);
    tree.check().unwrap();

    for oid in 0..300 {
        assert_eq!(tree.get(&Key::stat_data(1, oid)).unwrap(), Some(sd(oid)));
    }
    let (_, entry) = tree.find_entry(1, b"notes.txt").unwrap().unwrap();
    assert_eq!(entry.target_objectid, 7);
}

/// Test that changes made after reopening persist as well.
#[test]
fn test_modify_reopened_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.img");

    {
        let mut tree = Tree::create(
            config(NodeFormat::Checksummed),
            DiskManager::create(&path, NODE_SIZE).unwrap(),
        )
        .unwrap();
        for oid in 0..200 {
            tree.insert(&sd(oid)).unwrap();
        }
        tree.sync().unwrap();
    }

    {
        let mut tree = Tree::open(
            config(NodeFormat::Checksummed),
            DiskManager::open(&path, NODE_SIZE).unwrap(),
        )
        .unwrap();
        for oid in (0..200).filter(|oid| oid % 2 == 0) {
            tree.remove_key(&Key::stat_data(1, oid)).unwrap();
        }
        tree.insert(&sd(1000)).unwrap();
        tree.sync().unwrap();
    }

    let mut tree = Tree::open(
        config(NodeFormat::Checksummed),
        DiskManager::open(&path, NODE_SIZE).unwrap(),
    )
    .unwrap();
    tree.check().unwrap();
    for oid in 0..200 {
        let stored = tree.get(&Key::stat_data(1, oid)).unwrap();
        assert_eq!(stored.is_some(), oid % 2 == 1, "object {}", oid);
    }
    assert_eq!(tree.get(&Key::stat_data(1, 1000)).unwrap(), Some(sd(1000)));
}

/// Test that a tree small enough to evict keeps working from disk.
#[test]
fn test_eviction_reads_back_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.img");
    let config = TreeConfig {
        cache_capacity: 8,
        ..config(NodeFormat::Plain)
    };

    let mut tree = Tree::create(config, DiskManager::create(&path, NODE_SIZE).unwrap()).unwrap();
    for oid in 0..400 {
        tree.insert(&sd(oid)).unwrap();
    }
    for oid in (0..400).rev() {
        assert_eq!(tree.get(&Key::stat_data(1, oid)).unwrap(), Some(sd(oid)));
    }

    let stats = tree.stats().snapshot();
    assert!(stats.evictions > 0);
    assert!(stats.nodes_read > 0);
    assert!(tree.cached_nodes() <= 8 + tree.height() as usize);
}

/// Test that a read-only tree serves lookups and refuses changes.
#[test]
fn test_read_only_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.img");
    {
        let mut tree = Tree::create(
            config(NodeFormat::Plain),
            DiskManager::create(&path, NODE_SIZE).unwrap(),
        )
        .unwrap();
        tree.insert(&sd(5)).unwrap();
        tree.sync().unwrap();
    }

    let read_only = TreeConfig {
        read_only: true,
        ..config(NodeFormat::Plain)
    };
    let mut tree = Tree::open(read_only, DiskManager::open(&path, NODE_SIZE).unwrap()).unwrap();
    assert_eq!(tree.get(&Key::stat_data(1, 5)).unwrap(), Some(sd(5)));
    assert!(matches!(tree.insert(&sd(6)), Err(Error::ReadOnly)));
    assert!(matches!(
        tree.remove_key(&Key::stat_data(1, 5)),
        Err(Error::ReadOnly)
    ));
    tree.sync().unwrap();
}

/// Test that opening a file formatted with another node size fails.
#[test]
fn test_open_with_wrong_node_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.img");
    {
        let mut tree = Tree::create(
            config(NodeFormat::Plain),
            DiskManager::create(&path, NODE_SIZE).unwrap(),
        )
        .unwrap();
        tree.sync().unwrap();
    }

    let other = TreeConfig {
        node_size: 1024,
        ..config(NodeFormat::Plain)
    };
    let result = Tree::open(other, DiskManager::open(&path, 1024).unwrap());
    assert!(result.is_err());
}
