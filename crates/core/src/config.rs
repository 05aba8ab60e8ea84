//! On-disk format constants for fstree.

/// Default size of a tree node in bytes.
///
/// Nodes are the unit of I/O between the device and the node cache. Body
/// offsets are stored as `u16`, which bounds the node size from above.
pub const DEFAULT_NODE_SIZE: usize = 4096;

/// Smallest node size accepted by a tree configuration.
pub const MIN_NODE_SIZE: usize = 256;

/// Largest node size accepted by a tree configuration.
pub const MAX_NODE_SIZE: usize = 32768;

/// Size of the plain (node40) node header in bytes.
pub const NODE40_HEADER_SIZE: usize = 28;

/// Size of the checksum appended to the header in the node41 layout.
pub const NODE41_CHECKSUM_SIZE: usize = 4;

/// Size of one item descriptor: key (24) + offset (2) + flags (2) + plugin id (2).
pub const ITEM_HEADER_SIZE: usize = 30;

/// Magic value stored in every node header ("R4FS").
pub const NODE_MAGIC: u32 = 0x5234_4653;

/// Plugin id of the plain node layout.
pub const NODE40_PLUGIN_ID: u16 = 0;

/// Plugin id of the checksummed node layout.
pub const NODE41_PLUGIN_ID: u16 = 1;

/// Level of leaf nodes.
pub const LEAF_LEVEL: u8 = 1;

/// Level directly above the leaves.
pub const TWIG_LEVEL: u8 = 2;

/// Height below which the tree is never dried out.
pub const MIN_TREE_HEIGHT: u8 = 2;

/// Height above which the tree refuses to grow.
pub const MAX_TREE_HEIGHT: u8 = 16;

/// Size of a file data block addressed by extent units.
pub const FILE_BLOCK_SIZE: u64 = 4096;

/// Block holding the superblock.
pub const SUPERBLOCK_BLOCK: u64 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_size_bounds() {
        assert!(MIN_NODE_SIZE.is_power_of_two());
        assert!(MAX_NODE_SIZE.is_power_of_two());
        assert!(DEFAULT_NODE_SIZE >= MIN_NODE_SIZE && DEFAULT_NODE_SIZE <= MAX_NODE_SIZE);
        // Offsets must fit in a u16.
        assert!(MAX_NODE_SIZE <= u16::MAX as usize);
    }

    #[test]
    fn test_item_header_holds_a_key() {
        assert_eq!(ITEM_HEADER_SIZE, crate::KEY_SIZE + 6);
    }
}
