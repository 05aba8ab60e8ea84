//! Disk Manager - file-backed block device.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing blocks
//! - Growing the file as higher blocks are written
//! - Flushing the file to stable storage

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::{BlockNr, Error, Result};
use crate::storage::BlockDevice;

/// Stores the blocks of one tree in a single file.
///
/// # File Layout
/// Blocks are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Block 0 │ Block 1 │ Block 2 │  ...    │ Block N │
/// │ (super) │ (node)  │ (node)  │         │ (node)  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0       B       2B      ...      N×B
/// ```
///
/// Block N is located at file offset `N × block_size`.
///
/// # Durability
/// Writes go to the OS page cache; [`BlockDevice::flush`] calls `fsync()`.
/// The tree flushes once per `sync()`.
pub struct DiskManager {
    file: File,
    block_size: usize,
    /// Number of blocks covered by the file.
    block_count: u64,
}

impl DiskManager {
    /// Create a new, empty device file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            block_size,
            block_count: 0,
        })
    }

    /// Open an existing device file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let block_count = file_size / block_size as u64;

        Ok(Self {
            file,
            block_size,
            block_count,
        })
    }

    /// Open an existing device file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, block_size)
        } else {
            Self::create(path, block_size)
        }
    }

    /// Number of blocks covered by the file.
    #[inline]
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.block_count * self.block_size as u64
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

impl BlockDevice for DiskManager {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, blk: BlockNr, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        if blk.0 >= self.block_count {
            return Err(Error::NotFound);
        }

        self.file
            .seek(SeekFrom::Start(blk.0 * self.block_size as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&mut self, blk: BlockNr, buf: &[u8]) -> Result<()> {
        self.check_len(buf.len())?;

        // Writing past the end extends the file; the gap reads back as zeros.
        self.file
            .seek(SeekFrom::Start(blk.0 * self.block_size as u64))?;
        self.file.write_all(buf)?;

        if blk.0 >= self.block_count {
            self.block_count = blk.0 + 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
