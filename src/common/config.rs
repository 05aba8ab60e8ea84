//! Tree configuration.

use fstree_core::config::{DEFAULT_NODE_SIZE, MAX_NODE_SIZE, MIN_NODE_SIZE};
use fstree_core::{Error, Result};

/// On-disk layout used for nodes created by a tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NodeFormat {
    /// node40: 28-byte header, no checksum.
    #[default]
    Plain,
    /// node41: node40 header followed by a CRC32C of the rest of the block.
    Checksummed,
}

/// Settings chosen when a tree is created or opened.
///
/// The value is immutable once handed to the tree; it replaces both the
/// compile-time "minimal build" switches and any process-wide plugin table.
///
/// # Example
/// ```
/// use fstree::{NodeFormat, TreeConfig};
///
/// let config = TreeConfig {
///     node_size: 512,
///     format: NodeFormat::Checksummed,
///     ..TreeConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Size of every node (and device block) in bytes.
    pub node_size: usize,

    /// Layout of newly created nodes. Loaded nodes keep their own layout.
    pub format: NodeFormat,

    /// Number of nodes the cache may hold before an eviction sweep runs.
    pub cache_capacity: usize,

    /// Number of blocks the allocator manages (block 0 is the superblock).
    pub block_count: u64,

    /// Stamp written into every node created by this tree.
    pub mkfs_id: u32,

    /// Reject every mutating operation.
    pub read_only: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            node_size: DEFAULT_NODE_SIZE,
            format: NodeFormat::Plain,
            cache_capacity: 1024,
            block_count: 1 << 16,
            mkfs_id: 0,
            read_only: false,
        }
    }
}

impl TreeConfig {
    /// Check that the settings describe a usable tree.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for a node size outside
    /// `MIN_NODE_SIZE..=MAX_NODE_SIZE` or not a power of two, a zero cache
    /// capacity, or fewer than two blocks.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_NODE_SIZE..=MAX_NODE_SIZE).contains(&self.node_size)
            || !self.node_size.is_power_of_two()
        {
            return Err(Error::invalid(format!(
                "node size {} must be a power of two in {}..={}",
                self.node_size, MIN_NODE_SIZE, MAX_NODE_SIZE
            )));
        }
        if self.cache_capacity < 4 {
            return Err(Error::invalid("cache capacity must be at least 4 nodes"));
        }
        if self.block_count < 2 {
            return Err(Error::invalid("device must hold at least two blocks"));
        }
        Ok(())
    }
}
