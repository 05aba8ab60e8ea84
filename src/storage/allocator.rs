//! Block allocation.
//!
//! The tree asks a [`BlockAllocator`] for a block whenever it creates a node
//! and hands the block back when a node is released. [`BitmapAllocator`] is
//! the in-memory implementation used by [`Tree`](crate::tree::Tree); its
//! state is rebuilt from the tree itself when a tree is opened.

use crate::common::{BlockNr, Error, Result};

/// Hands out and takes back device blocks.
pub trait BlockAllocator: Send {
    /// Allocate `count` contiguous blocks and return the first one.
    ///
    /// # Errors
    /// Returns `Error::NoSpace` if no run of `count` free blocks exists.
    fn allocate(&mut self, count: u64) -> Result<BlockNr>;

    /// Return `count` blocks starting at `blk`.
    fn release(&mut self, blk: BlockNr, count: u64);

    /// Mark `blk` as used without allocating it (used while rebuilding).
    fn mark_used(&mut self, blk: BlockNr);

    /// Whether `blk` is currently allocated.
    fn is_used(&self, blk: BlockNr) -> bool;

    /// Number of free blocks.
    fn free_blocks(&self) -> u64;
}

/// One bit per block; scans forward from the last allocation.
#[derive(Debug, Clone)]
pub struct BitmapAllocator {
    words: Vec<u64>,
    block_count: u64,
    free: u64,
    /// Where the next search starts.
    cursor: u64,
}

impl BitmapAllocator {
    /// Create an allocator for `block_count` blocks with the first
    /// `reserved` blocks already in use.
    pub fn new(block_count: u64, reserved: u64) -> Self {
        let words = vec![0u64; block_count.div_ceil(64) as usize];
        let mut alloc = Self {
            words,
            block_count,
            free: block_count,
            cursor: 0,
        };
        for blk in 0..reserved.min(block_count) {
            alloc.mark_used(BlockNr::new(blk));
        }
        alloc
    }

    /// Total number of blocks managed.
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    #[inline]
    fn bit(&self, blk: u64) -> bool {
        self.words[(blk / 64) as usize] & (1 << (blk % 64)) != 0
    }

    #[inline]
    fn set_bit(&mut self, blk: u64, used: bool) {
        let word = &mut self.words[(blk / 64) as usize];
        if used {
            *word |= 1 << (blk % 64);
        } else {
            *word &= !(1 << (blk % 64));
        }
    }

    fn find_run(&self, start: u64, end: u64, count: u64) -> Option<u64> {
        let mut run_start = start;
        let mut run_len = 0;
        for blk in start..end {
            if self.bit(blk) {
                run_len = 0;
                run_start = blk + 1;
            } else {
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            }
        }
        None
    }
}

impl BlockAllocator for BitmapAllocator {
    fn allocate(&mut self, count: u64) -> Result<BlockNr> {
        if count == 0 || count > self.free {
            return Err(Error::NoSpace);
        }

        let first = self
            .find_run(self.cursor, self.block_count, count)
            .or_else(|| self.find_run(0, self.block_count, count))
            .ok_or(Error::NoSpace)?;

        for blk in first..first + count {
            self.set_bit(blk, true);
        }
        self.free -= count;
        self.cursor = first + count;
        Ok(BlockNr::new(first))
    }

    fn release(&mut self, blk: BlockNr, count: u64) {
        for b in blk.0..(blk.0 + count).min(self.block_count) {
            if self.bit(b) {
                self.set_bit(b, false);
                self.free += 1;
            }
        }
    }

    fn mark_used(&mut self, blk: BlockNr) {
        if blk.0 < self.block_count && !self.bit(blk.0) {
            self.set_bit(blk.0, true);
            self.free -= 1;
        }
    }

    fn is_used(&self, blk: BlockNr) -> bool {
        blk.0 < self.block_count && self.bit(blk.0)
    }

    fn free_blocks(&self) -> u64 {
        self.free
    }
}
