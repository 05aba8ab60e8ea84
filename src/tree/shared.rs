//! Thread-safe handle to a tree.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::{CacheStats, Tree};
use crate::common::{Key, Result};
use crate::item::Item;

/// A tree shared between threads.
///
/// The mutex is the tree-wide structural lock: every operation, including
/// lookups (which may load and evict nodes), runs under it. Statistics are
/// atomic and readable without taking the lock.
///
/// # Example
/// ```
/// use fstree::item::{Item, StatData};
/// use fstree::storage::MemoryDevice;
/// use fstree::{Key, SharedTree, Tree, TreeConfig};
///
/// let config = TreeConfig { node_size: 512, ..TreeConfig::default() };
/// let tree = SharedTree::new(Tree::create(config, MemoryDevice::new(512)).unwrap());
///
/// let writer = tree.clone();
/// std::thread::spawn(move || {
///     writer.insert(&Item::stat_data(Key::stat_data(1, 2), StatData::default())).unwrap();
/// })
/// .join()
/// .unwrap();
///
/// assert!(tree.get(&Key::stat_data(1, 2)).unwrap().is_some());
/// ```
#[derive(Clone)]
pub struct SharedTree {
    inner: Arc<Mutex<Tree>>,
    stats: Arc<CacheStats>,
}

impl SharedTree {
    pub fn new(tree: Tree) -> Self {
        let stats = tree.stats();
        Self {
            inner: Arc::new(Mutex::new(tree)),
            stats,
        }
    }

    /// Exclusive access for operations without a shortcut here.
    pub fn lock(&self) -> MutexGuard<'_, Tree> {
        self.inner.lock()
    }

    pub fn insert(&self, item: &Item) -> Result<()> {
        self.inner.lock().insert(item).map(|_| ())
    }

    pub fn get(&self, key: &Key) -> Result<Option<Item>> {
        self.inner.lock().get(key)
    }

    pub fn remove_key(&self, key: &Key) -> Result<()> {
        self.inner.lock().remove_key(key)
    }

    pub fn sync(&self) -> Result<()> {
        self.inner.lock().sync()
    }

    pub fn check(&self) -> Result<()> {
        self.inner.lock().check()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
