//! Storage layer - block devices, block allocation and the superblock.
//!
//! This module holds the collaborators the tree consumes:
//! - [`BlockDevice`] - Block I/O ([`DiskManager`], [`MemoryDevice`])
//! - [`BlockAllocator`] - Free block accounting ([`BitmapAllocator`])
//! - [`Superblock`] - Root block and height record

mod allocator;
mod device;
mod disk_manager;
mod superblock;

pub use allocator::{BitmapAllocator, BlockAllocator};
pub use device::{BlockDevice, MemoryDevice};
pub use disk_manager::DiskManager;
pub use superblock::{Superblock, SUPERBLOCK_MAGIC};
