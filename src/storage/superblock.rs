//! Superblock - the format record stored in block 0.
//!
//! The superblock tells the tree where its root lives and how tall the tree
//! is. It is rewritten on every `sync()`.

use crate::common::{BlockNr, Error, Result};

/// Magic value identifying a superblock ("FSTR").
pub const SUPERBLOCK_MAGIC: u32 = 0x4653_5452;

/// Metadata stored at the beginning of block 0.
///
/// # Layout (44 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic
/// 4       4     checksum (CRC32C over the record with this field zeroed)
/// 8       4     block_size
/// 12      8     root_block (u64::MAX when the tree is empty)
/// 20      1     height
/// 21      3     padding
/// 24      4     mkfs_id
/// 28      8     flush_id
/// 36      8     block_count
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub block_size: u32,
    pub root_block: BlockNr,
    pub height: u8,
    pub mkfs_id: u32,
    pub flush_id: u64,
    pub block_count: u64,
}

impl Superblock {
    /// Size of the record in bytes.
    pub const SIZE: usize = 44;

    pub const OFFSET_MAGIC: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 4;
    pub const OFFSET_BLOCK_SIZE: usize = 8;
    pub const OFFSET_ROOT: usize = 12;
    pub const OFFSET_HEIGHT: usize = 20;
    pub const OFFSET_MKFS_ID: usize = 24;
    pub const OFFSET_FLUSH_ID: usize = 28;
    pub const OFFSET_BLOCK_COUNT: usize = 36;

    /// Superblock of a tree with no nodes.
    pub fn empty(block_size: u32, block_count: u64, mkfs_id: u32) -> Self {
        Self {
            block_size,
            root_block: BlockNr::INVALID,
            height: 0,
            mkfs_id,
            flush_id: 0,
            block_count,
        }
    }

    /// Read and verify a superblock from the beginning of a block.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` on a bad magic or checksum.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::corrupted(0, "block too small for superblock"));
        }
        if read_u32(data, Self::OFFSET_MAGIC) != SUPERBLOCK_MAGIC {
            return Err(Error::corrupted(0, "bad superblock magic"));
        }
        if read_u32(data, Self::OFFSET_CHECKSUM) != Self::compute_checksum(data) {
            return Err(Error::corrupted(0, "superblock checksum mismatch"));
        }

        Ok(Self {
            block_size: read_u32(data, Self::OFFSET_BLOCK_SIZE),
            root_block: BlockNr::new(read_u64(data, Self::OFFSET_ROOT)),
            height: data[Self::OFFSET_HEIGHT],
            mkfs_id: read_u32(data, Self::OFFSET_MKFS_ID),
            flush_id: read_u64(data, Self::OFFSET_FLUSH_ID),
            block_count: read_u64(data, Self::OFFSET_BLOCK_COUNT),
        })
    }

    /// Write this superblock (with checksum) to the beginning of a block.
    ///
    /// # Panics
    /// Panics if `data.len() < Superblock::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for Superblock");

        data[..Self::SIZE].fill(0);
        data[Self::OFFSET_MAGIC..Self::OFFSET_MAGIC + 4]
            .copy_from_slice(&SUPERBLOCK_MAGIC.to_le_bytes());
        data[Self::OFFSET_BLOCK_SIZE..Self::OFFSET_BLOCK_SIZE + 4]
            .copy_from_slice(&self.block_size.to_le_bytes());
        data[Self::OFFSET_ROOT..Self::OFFSET_ROOT + 8]
            .copy_from_slice(&self.root_block.0.to_le_bytes());
        data[Self::OFFSET_HEIGHT] = self.height;
        data[Self::OFFSET_MKFS_ID..Self::OFFSET_MKFS_ID + 4]
            .copy_from_slice(&self.mkfs_id.to_le_bytes());
        data[Self::OFFSET_FLUSH_ID..Self::OFFSET_FLUSH_ID + 8]
            .copy_from_slice(&self.flush_id.to_le_bytes());
        data[Self::OFFSET_BLOCK_COUNT..Self::OFFSET_BLOCK_COUNT + 8]
            .copy_from_slice(&self.block_count.to_le_bytes());

        let checksum = Self::compute_checksum(data);
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum.to_le_bytes());
    }

    /// CRC32C of the record, computed with the checksum field zeroed.
    pub fn compute_checksum(data: &[u8]) -> u32 {
        let crc = crc32c::crc32c(&data[..Self::OFFSET_CHECKSUM]);
        let crc = crc32c::crc32c_append(crc, &[0u8; 4]);
        crc32c::crc32c_append(crc, &data[Self::OFFSET_CHECKSUM + 4..Self::SIZE])
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(raw)
}
