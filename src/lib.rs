//! fstree - an on-disk balanced tree storing filesystem items in fixed-size
//! nodes.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            fstree                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Tree engine (tree/)                        │    │
//! │  │  lookup · insert · remove · shift · growup / dry-out    │    │
//! │  │       NodeCache (Znode arena) + CacheStats              │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │      Nodes (node/) + Coordinates (coord.rs)             │    │
//! │  │   node40 layout · expand/shrink · node shift · check    │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                   Items (item/)                         │    │
//! │  │  stat-data · node pointer · tail · extent · dir entry   │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                Storage (storage/)                       │    │
//! │  │   BlockDevice · BlockAllocator · Superblock             │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (Key, BlockNr, NodeId, Error, config)
//! - [`storage`] - Block devices, block allocation and the superblock
//! - [`item`] - Item kinds and their unit operations
//! - [`node`] - The node layout and single-node algorithms
//! - [`coord`] - Positions inside a node
//! - [`tree`] - The tree engine
//!
//! # Quick Start
//! ```
//! use fstree::item::{Item, StatData};
//! use fstree::storage::MemoryDevice;
//! use fstree::{Key, Tree, TreeConfig};
//!
//! let config = TreeConfig { node_size: 1024, ..TreeConfig::default() };
//! let mut tree = Tree::create(config, MemoryDevice::new(1024)).unwrap();
//!
//! tree.insert(&Item::stat_data(Key::stat_data(42, 100), StatData::default())).unwrap();
//! tree.add_entry(42, b"readme", 42, 100).unwrap();
//!
//! let (_, entry) = tree.find_entry(42, b"readme").unwrap().unwrap();
//! assert!(tree.get(&entry.target_key()).unwrap().is_some());
//! tree.sync().unwrap();
//! ```

pub mod common;
pub mod coord;
pub mod item;
pub mod node;
pub mod storage;
pub mod tree;

// Re-export commonly used items at crate root for convenience
pub use common::{BlockNr, Error, Key, KeyType, NodeFormat, NodeId, Result, TreeConfig};
pub use coord::{Between, Coord};
pub use item::{Item, ItemKind};
pub use tree::{SharedTree, Tree};
