//! The tree engine.
//!
//! [`Tree`] owns the node cache, the block device and the block allocator,
//! and implements every tree-level algorithm on top of [`Node`]:
//! - `lookup` - descent by key, neighbour steps, collision runs
//! - `modify` - insertion, overwrite, directory entries
//! - `shift` - rebalancing between siblings and node splits
//! - `remove` - unit removal, detaching empty nodes, packing
//! - `height` - growing and shrinking the tree at the root
//! - `walk`, `check`, `sync` - traversal, validation, write-back
//!
//! Nodes are addressed by generational [`NodeId`] handles into the cache.
//! A handle to an unloaded node yields `Error::StaleHandle`, never another
//! node.

mod cache;
mod check;
mod height;
mod lookup;
mod modify;
mod remove;
mod shared;
mod shift;
mod stats;
mod sync;
mod walk;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::common::format::SUPERBLOCK_BLOCK;
use crate::common::{BlockNr, Error, NodeId, Result, TreeConfig};
use crate::coord::{Between, Coord};
use crate::node::{Bias, Direction, Node};
use crate::storage::{BitmapAllocator, BlockAllocator, BlockDevice, Superblock};

pub use cache::{select_victims, NodeCache, ParentLink, Znode};
pub use shared::SharedTree;
pub use stats::{CacheStats, StatsSnapshot};
pub use walk::TreeVisitor;

/// An on-disk balanced tree of items.
///
/// # Architecture
/// ```text
/// ┌────────────────────────────────────────────────────────┐
/// │                         Tree                           │
/// │  ┌──────────────┐   ┌───────────────────────────────┐  │
/// │  │ root, height │──▶│ cache: NodeCache (Znode arena)│  │
/// │  └──────────────┘   └───────────────────────────────┘  │
/// │  ┌──────────────┐   ┌──────────────┐  ┌────────────┐   │
/// │  │    device    │   │  allocator   │  │   stats    │   │
/// │  │ BlockDevice  │   │BlockAllocator│  │ CacheStats │   │
/// │  └──────────────┘   └──────────────┘  └────────────┘   │
/// └────────────────────────────────────────────────────────┘
/// ```
///
/// The root stays cached while the tree is open. Every other node is loaded
/// on demand by a descent and may be evicted once it is clean, unpinned and
/// has no cached children.
///
/// # Usage
/// ```
/// use fstree::item::Item;
/// use fstree::storage::MemoryDevice;
/// use fstree::{Key, Tree, TreeConfig};
///
/// let config = TreeConfig { node_size: 512, ..TreeConfig::default() };
/// let mut tree = Tree::create(config, MemoryDevice::new(512)).unwrap();
///
/// tree.insert(&Item::tail(Key::file_body(1, 2, 0), b"hello".to_vec())).unwrap();
/// let unit = tree.get(&Key::file_body(1, 2, 4)).unwrap().unwrap();
/// assert_eq!(unit.key.offset(), 4);
/// ```
pub struct Tree {
    config: TreeConfig,
    device: Box<dyn BlockDevice>,
    allocator: Box<dyn BlockAllocator>,
    cache: NodeCache,
    root: Option<NodeId>,
    /// 0 for an empty tree, otherwise the level of the root.
    height: u8,
    flush_id: u64,
    /// Set while an eviction sweep runs.
    evicting: bool,
    stats: Arc<CacheStats>,
}

impl Tree {
    // ========================================================================
    // Creation
    // ========================================================================

    /// Format `device` with an empty tree.
    ///
    /// # Errors
    /// - `Error::InvalidArgument` if `config` is invalid or the device block
    ///   size differs from `config.node_size`
    /// - `Error::Io` if the superblock cannot be written
    pub fn create<D: BlockDevice + 'static>(config: TreeConfig, device: D) -> Result<Self> {
        let allocator = BitmapAllocator::new(config.block_count, SUPERBLOCK_BLOCK + 1);
        Self::create_with(config, device, allocator)
    }

    /// Like [`create`](Self::create), with a caller-supplied allocator.
    pub fn create_with<D, A>(config: TreeConfig, device: D, allocator: A) -> Result<Self>
    where
        D: BlockDevice + 'static,
        A: BlockAllocator + 'static,
    {
        config.validate()?;
        if config.read_only {
            return Err(Error::ReadOnly);
        }
        check_block_size(&config, &device)?;

        let mut tree = Self::assemble(config, Box::new(device), Box::new(allocator));
        tree.write_superblock()?;
        tree.device.flush()?;
        debug!(
            node_size = tree.config.node_size,
            blocks = tree.config.block_count,
            "created empty tree"
        );
        Ok(tree)
    }

    /// Open the tree stored on `device`.
    ///
    /// The superblock supplies the block count, which overrides
    /// `config.block_count`. Allocator state is rebuilt by reading every
    /// node reachable from the root.
    ///
    /// # Errors
    /// - `Error::Corrupted` for a bad superblock or node
    /// - `Error::InvalidArgument` if the stored block size differs from
    ///   `config.node_size`
    pub fn open<D: BlockDevice + 'static>(mut config: TreeConfig, device: D) -> Result<Self> {
        config.validate()?;
        check_block_size(&config, &device)?;

        let mut device: Box<dyn BlockDevice> = Box::new(device);
        let mut buf = vec![0u8; config.node_size];
        device.read_block(BlockNr::new(SUPERBLOCK_BLOCK), &mut buf)?;
        let sb = Superblock::from_bytes(&buf)?;
        if sb.block_size as usize != config.node_size {
            return Err(Error::invalid(format!(
                "tree was created with {}-byte nodes, not {}",
                sb.block_size, config.node_size
            )));
        }
        config.block_count = sb.block_count;

        let allocator = BitmapAllocator::new(sb.block_count, SUPERBLOCK_BLOCK + 1);
        let mut tree = Self::assemble(config, device, Box::new(allocator));
        tree.flush_id = sb.flush_id;

        if sb.root_block.is_valid() {
            let node = tree.read_node(sb.root_block)?;
            if node.level() != sb.height {
                return Err(Error::corrupted(
                    sb.root_block.0,
                    format!("root on level {}, superblock says {}", node.level(), sb.height),
                ));
            }
            tree.rebuild_allocator(&node)?;
            tree.root = Some(tree.cache.insert(Znode::new(node, None))?);
            tree.height = sb.height;
        }
        debug!(height = tree.height, flush_id = tree.flush_id, "opened tree");
        Ok(tree)
    }

    fn assemble(
        config: TreeConfig,
        device: Box<dyn BlockDevice>,
        allocator: Box<dyn BlockAllocator>,
    ) -> Self {
        Self {
            config,
            device,
            allocator,
            cache: NodeCache::new(),
            root: None,
            height: 0,
            flush_id: 0,
            evicting: false,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Mark every block reachable from `node` as used.
    fn rebuild_allocator(&mut self, node: &Node) -> Result<()> {
        self.allocator.mark_used(node.block());
        if node.is_leaf() {
            return Ok(());
        }
        for pos in 0..node.items() {
            let child = self.read_node(node.child(pos)?)?;
            if child.level() + 1 != node.level() {
                return Err(Error::corrupted(child.block().0, "child on the wrong level"));
            }
            self.rebuild_allocator(&child)?;
        }
        Ok(())
    }

    /// Give back the device, dropping every unsynced change.
    pub fn into_device(self) -> Box<dyn BlockDevice> {
        self.device
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Handle of the root node, `None` for an empty tree.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Number of nodes currently cached.
    pub fn cached_nodes(&self) -> usize {
        self.cache.len()
    }

    pub fn free_blocks(&self) -> u64 {
        self.allocator.free_blocks()
    }

    /// The cached node behind `id`.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        Ok(&self.cache.get(id)?.node)
    }

    /// Mutable access to a node; marks it dirty.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        let znode = self.cache.get_mut(id)?;
        znode.dirty = true;
        Ok(&mut znode.node)
    }

    pub fn is_dirty(&self, id: NodeId) -> Result<bool> {
        Ok(self.cache.get(id)?.dirty)
    }

    pub fn mark_dirty(&mut self, id: NodeId) -> Result<()> {
        self.cache.get_mut(id)?.dirty = true;
        Ok(())
    }

    pub(crate) fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            Err(Error::ReadOnly)
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Pins
    // ========================================================================

    /// Keep a node loaded until the matching [`unpin`](Self::unpin).
    pub fn pin(&mut self, id: NodeId) -> Result<()> {
        self.cache.get_mut(id)?.pins += 1;
        Ok(())
    }

    /// Drop a pin. A detached node is released with its last pin.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the node is not pinned.
    pub fn unpin(&mut self, id: NodeId) -> Result<()> {
        let znode = self.cache.get_mut(id)?;
        if znode.pins == 0 {
            return Err(Error::invalid(format!("{} is not pinned", id)));
        }
        znode.pins -= 1;
        if znode.pins == 0 && znode.heard_banshee {
            self.release_node(id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Node lifecycle
    // ========================================================================

    fn read_node(&mut self, block: BlockNr) -> Result<Node> {
        let mut buf = vec![0u8; self.config.node_size].into_boxed_slice();
        self.device.read_block(block, &mut buf)?;
        CacheStats::bump(&self.stats.nodes_read);
        Node::from_bytes(block, buf)
    }

    /// Handle of child `pos` of `parent`, loading it if needed.
    pub fn connect_node(&mut self, parent: NodeId, pos: usize) -> Result<NodeId> {
        self.load_child(parent, pos)
    }

    pub(crate) fn load_child(&mut self, parent: NodeId, pos: usize) -> Result<NodeId> {
        let (block, level) = {
            let node = self.node(parent)?;
            if pos >= node.items() {
                return Err(Error::invalid(format!("{} has no child {}", parent, pos)));
            }
            (node.child(pos)?, node.level())
        };
        let link = Some(ParentLink { node: parent, pos });

        if let Some(id) = self.cache.lookup_block(block) {
            CacheStats::bump(&self.stats.cache_hits);
            self.cache.get_mut(id)?.parent = link;
            return Ok(id);
        }
        CacheStats::bump(&self.stats.cache_misses);

        let node = self.read_node(block)?;
        if node.level() + 1 != level {
            return Err(Error::corrupted(
                block.0,
                format!("child on level {} under level {}", node.level(), level),
            ));
        }
        self.cache.insert(Znode::new(node, link))
    }

    /// Create an empty, dirty node on `level`.
    pub(crate) fn alloc_node(&mut self, level: u8) -> Result<NodeId> {
        let block = self.allocator.allocate(1)?;
        let node = Node::new(
            block,
            self.config.node_size,
            level,
            self.config.format,
            self.config.mkfs_id,
        );
        let mut znode = Znode::new(node, None);
        znode.dirty = true;
        let id = self.cache.insert(znode)?;
        CacheStats::bump(&self.stats.nodes_allocated);
        debug!(block = block.0, level, "allocated node");
        Ok(id)
    }

    /// Unload a node and return its block to the allocator.
    pub(crate) fn release_node(&mut self, id: NodeId) -> Result<()> {
        let znode = self.cache.remove(id)?;
        let block = znode.node.block();
        self.allocator.release(block, 1);
        CacheStats::bump(&self.stats.nodes_released);
        debug!(block = block.0, level = znode.node.level(), "released node");
        Ok(())
    }

    /// Release a detached node, or defer it while pinned.
    pub(crate) fn discard_node(&mut self, id: NodeId) -> Result<()> {
        let znode = self.cache.get_mut(id)?;
        znode.parent = None;
        if znode.pins > 0 {
            znode.heard_banshee = true;
            Ok(())
        } else {
            self.release_node(id)
        }
    }

    // ========================================================================
    // Parent and sibling links
    // ========================================================================

    /// Point the parent links of every cached child of `id` at their slots.
    pub(crate) fn refresh_child_links(&mut self, id: NodeId) -> Result<()> {
        let blocks = {
            let node = self.node(id)?;
            if node.is_leaf() {
                return Ok(());
            }
            (0..node.items())
                .map(|pos| node.child(pos))
                .collect::<Result<Vec<_>>>()?
        };
        for (pos, block) in blocks.into_iter().enumerate() {
            if let Some(child) = self.cache.lookup_block(block) {
                self.cache.get_mut(child)?.parent = Some(ParentLink { node: id, pos });
            }
        }
        Ok(())
    }

    /// Parent of `id` and the position of its pointer there.
    ///
    /// Tries the cached position first, then a lookup by the node's leftmost
    /// key, then a scan of the whole parent.
    pub(crate) fn parent_pos(&mut self, id: NodeId) -> Result<(NodeId, usize)> {
        let znode = self.cache.get(id)?;
        let link = znode
            .parent
            .ok_or_else(|| Error::invalid(format!("{} has no parent", id)))?;
        let block = znode.node.block();
        let leftmost = znode.node.leftmost_key();
        let parent = self.node(link.node)?;

        let points_here = |pos: usize| -> Result<bool> {
            Ok(pos < parent.items() && parent.child(pos)? == block)
        };

        let found = if points_here(link.pos)? {
            Some(link.pos)
        } else {
            warn!(block = block.0, guess = link.pos, "stale parent position");
            let by_key = match leftmost {
                Some(key) => {
                    let mut coord = Coord::new(link.node);
                    parent.lookup(&key, Bias::Nearest, &mut coord)?;
                    let pos = if coord.between == Between::BeforeItem {
                        0
                    } else {
                        coord.item
                    };
                    points_here(pos)?.then_some(pos)
                }
                None => None,
            };
            match by_key {
                Some(pos) => Some(pos),
                None => {
                    warn!(block = block.0, "scanning parent for node pointer");
                    let mut hit = None;
                    for pos in 0..parent.items() {
                        if points_here(pos)? {
                            hit = Some(pos);
                            break;
                        }
                    }
                    hit
                }
            }
        };

        let pos = found.ok_or_else(|| Error::corrupted(block.0, "node missing from its parent"))?;
        self.cache.get_mut(id)?.parent = Some(ParentLink {
            node: link.node,
            pos,
        });
        Ok((link.node, pos))
    }

    /// The node next to `id` on the same level, if any.
    pub(crate) fn neighbor(&mut self, id: NodeId, direction: Direction) -> Result<Option<NodeId>> {
        let znode = self.cache.get(id)?;
        let cached = match direction {
            Direction::Left => znode.left,
            Direction::Right => znode.right,
        };
        if let Some(sibling) = cached.filter(|s| self.cache.contains(*s)) {
            return Ok(Some(sibling));
        }
        if Some(id) == self.root || znode.parent.is_none() {
            return Ok(None);
        }

        let (parent, pos) = self.parent_pos(id)?;
        let items = self.node(parent)?.items();
        let sibling = match direction {
            Direction::Left if pos > 0 => Some(self.load_child(parent, pos - 1)?),
            Direction::Right if pos + 1 < items => Some(self.load_child(parent, pos + 1)?),
            _ => match self.neighbor(parent, direction)? {
                None => None,
                Some(uncle) => {
                    let count = self.node(uncle)?.items();
                    if count == 0 {
                        None
                    } else {
                        let at = match direction {
                            Direction::Left => count - 1,
                            Direction::Right => 0,
                        };
                        Some(self.load_child(uncle, at)?)
                    }
                }
            },
        };

        if let Some(sibling) = sibling {
            match direction {
                Direction::Left => {
                    self.cache.get_mut(id)?.left = Some(sibling);
                    self.cache.get_mut(sibling)?.right = Some(id);
                }
                Direction::Right => {
                    self.cache.get_mut(id)?.right = Some(sibling);
                    self.cache.get_mut(sibling)?.left = Some(id);
                }
            }
        }
        Ok(sibling)
    }
}

fn check_block_size<D: BlockDevice>(config: &TreeConfig, device: &D) -> Result<()> {
    if device.block_size() != config.node_size {
        return Err(Error::invalid(format!(
            "device has {}-byte blocks, tree wants {}-byte nodes",
            device.block_size(),
            config.node_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Key, NodeFormat};
    use crate::item::Item;
    use crate::storage::MemoryDevice;

    pub(crate) fn small_config() -> TreeConfig {
        TreeConfig {
            node_size: 256,
            cache_capacity: 64,
            block_count: 4096,
            ..TreeConfig::default()
        }
    }

    pub(crate) fn small_tree() -> Tree {
        Tree::create(small_config(), MemoryDevice::new(256)).unwrap()
    }

    #[test]
    fn test_create_empty_tree() {
        let tree = small_tree();
        assert_eq!(tree.height(), 0);
        assert!(tree.root().is_none());
        assert_eq!(tree.free_blocks(), 4095);
    }

    #[test]
    fn test_create_rejects_block_size_mismatch() {
        let result = Tree::create(small_config(), MemoryDevice::new(512));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_open_unformatted_device_fails() {
        assert!(Tree::open(small_config(), MemoryDevice::new(256)).is_err());
    }

    #[test]
    fn test_pin_and_unpin() {
        let mut tree = small_tree();
        tree.insert(&Item::tail(Key::file_body(1, 1, 0), vec![1])).unwrap();
        let root = tree.root().unwrap();
        assert!(tree.unpin(root).is_err());
        tree.pin(root).unwrap();
        tree.unpin(root).unwrap();
    }

    #[test]
    fn test_new_nodes_are_dirty_until_sync() {
        let mut tree = small_tree();
        tree.insert(&Item::tail(Key::file_body(1, 1, 0), vec![1])).unwrap();
        let root = tree.root().unwrap();
        assert!(tree.is_dirty(root).unwrap());
        tree.sync().unwrap();
        assert!(!tree.is_dirty(root).unwrap());
        tree.mark_dirty(root).unwrap();
        assert!(tree.is_dirty(root).unwrap());
    }

    #[test]
    fn test_checksummed_nodes_round_trip() {
        let config = TreeConfig {
            format: NodeFormat::Checksummed,
            ..small_config()
        };
        let mut tree = Tree::create(config.clone(), MemoryDevice::new(256)).unwrap();
        for oid in 0..40 {
            tree.insert(&Item::tail(Key::file_body(1, oid, 0), vec![oid as u8; 8]))
                .unwrap();
        }
        tree.sync().unwrap();
        let device = tree.into_device();

        let mut tree = Tree::open(config, device).unwrap();
        tree.check().unwrap();
        let unit = tree.get(&Key::file_body(1, 39, 7)).unwrap().unwrap();
        assert_eq!(unit.key.objectid(), 39);
    }
}
