//! Block device abstraction.
//!
//! The tree reads and writes whole nodes through a [`BlockDevice`]. Two
//! implementations ship with the crate:
//! - [`DiskManager`](super::DiskManager) - a single file on disk
//! - [`MemoryDevice`] - blocks kept in memory, for tests and tools

use std::collections::HashMap;

use crate::common::{BlockNr, Error, Result};

/// Fixed-size block storage consumed by the tree.
pub trait BlockDevice: Send {
    /// Size of every block in bytes.
    fn block_size(&self) -> usize;

    /// Read block `blk` into `buf` (`buf.len() == block_size()`).
    ///
    /// # Errors
    /// Returns `Error::NotFound` if the block was never written.
    fn read_block(&mut self, blk: BlockNr, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` (`buf.len() == block_size()`) to block `blk`.
    fn write_block(&mut self, blk: BlockNr, buf: &[u8]) -> Result<()>;

    /// Make every completed write durable.
    fn flush(&mut self) -> Result<()>;
}

/// A device holding its blocks in memory.
///
/// # Example
/// ```
/// use fstree::storage::{BlockDevice, MemoryDevice};
/// use fstree::BlockNr;
///
/// let mut dev = MemoryDevice::new(512);
/// dev.write_block(BlockNr::new(3), &[7u8; 512]).unwrap();
///
/// let mut buf = [0u8; 512];
/// dev.read_block(BlockNr::new(3), &mut buf).unwrap();
/// assert_eq!(buf[0], 7);
/// ```
#[derive(Debug, Default)]
pub struct MemoryDevice {
    block_size: usize,
    blocks: HashMap<BlockNr, Box<[u8]>>,
    writes: u64,
}

impl MemoryDevice {
    /// Create an empty device with the given block size.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            blocks: HashMap::new(),
            writes: 0,
        }
    }

    /// Number of blocks written at least once.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of block writes performed.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.block_size {
            return Err(Error::invalid(format!(
                "buffer of {} bytes for {}-byte blocks",
                len, self.block_size
            )));
        }
        Ok(())
    }
}

impl BlockDevice for MemoryDevice {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, blk: BlockNr, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        let data = self.blocks.get(&blk).ok_or(Error::NotFound)?;
        buf.copy_from_slice(data);
        Ok(())
    }

    fn write_block(&mut self, blk: BlockNr, buf: &[u8]) -> Result<()> {
        self.check_len(buf.len())?;
        self.blocks.insert(blk, buf.into());
        self.writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for Box<D> {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn read_block(&mut self, blk: BlockNr, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(blk, buf)
    }

    fn write_block(&mut self, blk: BlockNr, buf: &[u8]) -> Result<()> {
        (**self).write_block(blk, buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
