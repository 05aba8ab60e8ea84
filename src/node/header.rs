//! Node and item headers.
//!
//! Every node starts with a [`NodeHeader`]. Item headers ([`ItemHeader`])
//! form an array growing backward from the end of the block: header `i`
//! lives at `node_size - (i + 1) * ITEM_HEADER_SIZE`.

use crate::common::format::{
    ITEM_HEADER_SIZE, NODE40_HEADER_SIZE, NODE40_PLUGIN_ID, NODE41_CHECKSUM_SIZE,
    NODE41_PLUGIN_ID,
};
use crate::common::{Key, NodeFormat, KEY_SIZE};

/// Metadata stored at the beginning of every node.
///
/// # Layout (28 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       2     plugin_id (0 = node40, 1 = node41)
/// 2       2     items
/// 4       2     free_space
/// 6       2     free_space_start
/// 8       4     magic
/// 12      4     mkfs_id
/// 16      8     flush_id
/// 24      2     flags
/// 26      1     level
/// 27      1     padding
/// ```
///
/// node41 appends a 4-byte CRC32C at offset 28, computed over the whole block
/// with the CRC field zeroed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub plugin_id: u16,
    pub items: u16,
    pub free_space: u16,
    pub free_space_start: u16,
    pub magic: u32,
    pub mkfs_id: u32,
    pub flush_id: u64,
    pub flags: u16,
    pub level: u8,
}

impl NodeHeader {
    pub const SIZE: usize = NODE40_HEADER_SIZE;

    pub const OFFSET_PLUGIN_ID: usize = 0;
    pub const OFFSET_ITEMS: usize = 2;
    pub const OFFSET_FREE_SPACE: usize = 4;
    pub const OFFSET_FREE_SPACE_START: usize = 6;
    pub const OFFSET_MAGIC: usize = 8;
    pub const OFFSET_MKFS_ID: usize = 12;
    pub const OFFSET_FLUSH_ID: usize = 16;
    pub const OFFSET_FLAGS: usize = 24;
    pub const OFFSET_LEVEL: usize = 26;
    pub const OFFSET_CHECKSUM: usize = NODE40_HEADER_SIZE;

    /// Read a header from the beginning of a block.
    ///
    /// # Panics
    /// Panics if `data.len() < NodeHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for NodeHeader");

        Self {
            plugin_id: read_u16(data, Self::OFFSET_PLUGIN_ID),
            items: read_u16(data, Self::OFFSET_ITEMS),
            free_space: read_u16(data, Self::OFFSET_FREE_SPACE),
            free_space_start: read_u16(data, Self::OFFSET_FREE_SPACE_START),
            magic: read_u32(data, Self::OFFSET_MAGIC),
            mkfs_id: read_u32(data, Self::OFFSET_MKFS_ID),
            flush_id: read_u64(data, Self::OFFSET_FLUSH_ID),
            flags: read_u16(data, Self::OFFSET_FLAGS),
            level: data[Self::OFFSET_LEVEL],
        }
    }

    /// Write this header to the beginning of a block.
    ///
    /// # Panics
    /// Panics if `data.len() < NodeHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for NodeHeader");

        write_u16(data, Self::OFFSET_PLUGIN_ID, self.plugin_id);
        write_u16(data, Self::OFFSET_ITEMS, self.items);
        write_u16(data, Self::OFFSET_FREE_SPACE, self.free_space);
        write_u16(data, Self::OFFSET_FREE_SPACE_START, self.free_space_start);
        write_u32(data, Self::OFFSET_MAGIC, self.magic);
        write_u32(data, Self::OFFSET_MKFS_ID, self.mkfs_id);
        write_u64(data, Self::OFFSET_FLUSH_ID, self.flush_id);
        write_u16(data, Self::OFFSET_FLAGS, self.flags);
        data[Self::OFFSET_LEVEL] = self.level;
        data[Self::OFFSET_LEVEL + 1] = 0;
    }

    /// Layout selected by the plugin id, if known.
    pub fn format(&self) -> Option<NodeFormat> {
        match self.plugin_id {
            NODE40_PLUGIN_ID => Some(NodeFormat::Plain),
            NODE41_PLUGIN_ID => Some(NodeFormat::Checksummed),
            _ => None,
        }
    }

    /// CRC32C of a node41 block, computed with the CRC field zeroed.
    pub fn compute_checksum(block: &[u8]) -> u32 {
        let crc = crc32c::crc32c(&block[..Self::OFFSET_CHECKSUM]);
        let crc = crc32c::crc32c_append(crc, &[0u8; NODE41_CHECKSUM_SIZE]);
        crc32c::crc32c_append(crc, &block[Self::OFFSET_CHECKSUM + NODE41_CHECKSUM_SIZE..])
    }
}

/// Plugin id written for a layout.
pub fn plugin_id_of(format: NodeFormat) -> u16 {
    match format {
        NodeFormat::Plain => NODE40_PLUGIN_ID,
        NodeFormat::Checksummed => NODE41_PLUGIN_ID,
    }
}

/// First byte available for item bodies.
pub fn body_start_of(format: NodeFormat) -> usize {
    match format {
        NodeFormat::Plain => NODE40_HEADER_SIZE,
        NodeFormat::Checksummed => NODE40_HEADER_SIZE + NODE41_CHECKSUM_SIZE,
    }
}

/// One entry of the item header array.
///
/// # Layout (30 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       24    key (big-endian words)
/// 24      2     body offset
/// 26      2     flags
/// 28      2     plugin id
/// ```
///
/// The body length is implicit: the distance to the next item's offset, or
/// to the start of free space for the last item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHeader {
    pub key: Key,
    pub offset: u16,
    pub flags: u16,
    pub plugin_id: u16,
}

impl ItemHeader {
    pub const SIZE: usize = ITEM_HEADER_SIZE;

    pub const OFFSET_KEY: usize = 0;
    pub const OFFSET_BODY: usize = KEY_SIZE;
    pub const OFFSET_FLAGS: usize = KEY_SIZE + 2;
    pub const OFFSET_PLUGIN_ID: usize = KEY_SIZE + 4;

    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            key: Key::from_bytes(&data[Self::OFFSET_KEY..]),
            offset: read_u16(data, Self::OFFSET_BODY),
            flags: read_u16(data, Self::OFFSET_FLAGS),
            plugin_id: read_u16(data, Self::OFFSET_PLUGIN_ID),
        }
    }

    pub fn write_to(&self, data: &mut [u8]) {
        self.key.write_to(&mut data[Self::OFFSET_KEY..]);
        write_u16(data, Self::OFFSET_BODY, self.offset);
        write_u16(data, Self::OFFSET_FLAGS, self.flags);
        write_u16(data, Self::OFFSET_PLUGIN_ID, self.plugin_id);
    }
}

// ============================================================================
// Little-endian field helpers
// ============================================================================

#[inline]
pub(crate) fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
pub(crate) fn write_u16(data: &mut [u8], at: usize, value: u16) {
    data[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], at: usize, value: u32) {
    data[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(raw)
}

#[inline]
pub(crate) fn write_u64(data: &mut [u8], at: usize, value: u64) {
    data[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::format::NODE_MAGIC;

    #[test]
    fn test_node_header_roundtrip() {
        let header = NodeHeader {
            plugin_id: NODE41_PLUGIN_ID,
            items: 3,
            free_space: 100,
            free_space_start: 200,
            magic: NODE_MAGIC,
            mkfs_id: 0xABCD,
            flush_id: 0x1122_3344_5566_7788,
            flags: 0,
            level: 2,
        };
        let mut buf = [0u8; 64];
        header.write_to(&mut buf);
        assert_eq!(NodeHeader::from_bytes(&buf), header);
        assert_eq!(header.format(), Some(NodeFormat::Checksummed));
    }

    #[test]
    fn test_node_header_byte_positions() {
        let header = NodeHeader {
            items: 0x0102,
            magic: NODE_MAGIC,
            level: 7,
            ..NodeHeader::default()
        };
        let mut buf = [0u8; NodeHeader::SIZE];
        header.write_to(&mut buf);
        assert_eq!(&buf[2..4], &[0x02, 0x01]);
        assert_eq!(&buf[8..12], &NODE_MAGIC.to_le_bytes());
        assert_eq!(buf[26], 7);
    }

    #[test]
    fn test_unknown_plugin_id() {
        let header = NodeHeader {
            plugin_id: 9,
            ..NodeHeader::default()
        };
        assert_eq!(header.format(), None);
    }

    #[test]
    fn test_item_header_roundtrip() {
        let header = ItemHeader {
            key: Key::file_body(1, 2, 3),
            offset: 28,
            flags: 0,
            plugin_id: 6,
        };
        let mut buf = [0u8; ItemHeader::SIZE];
        header.write_to(&mut buf);
        assert_eq!(ItemHeader::from_bytes(&buf), header);
    }

    #[test]
    fn test_checksum_ignores_own_field() {
        let mut block = vec![0u8; 256];
        block[100] = 42;
        let before = NodeHeader::compute_checksum(&block);
        block[NodeHeader::OFFSET_CHECKSUM] = 0xFF;
        assert_eq!(NodeHeader::compute_checksum(&block), before);
        block[101] = 1;
        assert_ne!(NodeHeader::compute_checksum(&block), before);
    }

    #[test]
    fn test_checksum_is_crc32c() {
        assert_eq!(crc32c::crc32c(b"123456789"), 0xE306_9283);

        let mut block: Vec<u8> = (0..256u32).map(|i| (i * 7) as u8).collect();
        block[NodeHeader::OFFSET_CHECKSUM..NodeHeader::OFFSET_CHECKSUM + NODE41_CHECKSUM_SIZE]
            .fill(0);
        let expected = crc32c::crc32c(&block);
        block[NodeHeader::OFFSET_CHECKSUM] = 0xAB;
        assert_eq!(NodeHeader::compute_checksum(&block), expected);
    }
}
