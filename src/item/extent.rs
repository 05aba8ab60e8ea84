//! Extent items: run-length lists of file blocks.
//!
//! Each unit maps `width` consecutive file blocks to the device blocks
//! starting at `start`. A `start` of zero marks a hole. Unit keys advance by
//! `width * FILE_BLOCK_SIZE` bytes.

use super::tail::same_stream;
use super::{ItemKind, ItemOps, UnitLookup, UnitOps};
use crate::common::format::FILE_BLOCK_SIZE;
use crate::common::{Error, Key, Result};

/// One extent: `width` blocks starting at device block `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtentUnit {
    pub start: u64,
    pub width: u64,
}

impl ExtentUnit {
    pub const SIZE: usize = 16;

    /// Bytes of file data the unit covers.
    #[inline]
    pub fn bytes(&self) -> u64 {
        self.width.saturating_mul(FILE_BLOCK_SIZE)
    }

    #[inline]
    pub fn is_hole(&self) -> bool {
        self.start == 0
    }
}

/// A list of extents covering a contiguous range of file offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent(pub Vec<ExtentUnit>);

impl Extent {
    /// File offset of unit `unit` relative to the item key.
    fn unit_offset(&self, unit: usize) -> u64 {
        self.0[..unit]
            .iter()
            .fold(0u64, |acc, u| acc.saturating_add(u.bytes()))
    }

    fn total_bytes(&self) -> u64 {
        self.unit_offset(self.0.len())
    }
}

impl ItemOps for Extent {
    const KIND: ItemKind = ItemKind::Extent;

    fn decode(_key: &Key, data: &[u8]) -> Result<Self> {
        if data.is_empty() || data.len() % ExtentUnit::SIZE != 0 {
            return Err(Error::invalid(format!("extent body of {} bytes", data.len())));
        }
        let units = data
            .chunks_exact(ExtentUnit::SIZE)
            .map(|chunk| {
                let mut start = [0u8; 8];
                let mut width = [0u8; 8];
                start.copy_from_slice(&chunk[..8]);
                width.copy_from_slice(&chunk[8..]);
                ExtentUnit {
                    start: u64::from_le_bytes(start),
                    width: u64::from_le_bytes(width),
                }
            })
            .collect::<Vec<_>>();
        if units.iter().any(|u| u.width == 0) {
            return Err(Error::invalid("extent of zero width"));
        }
        Ok(Extent(units))
    }

    fn encoded_len(&self) -> usize {
        self.0.len() * ExtentUnit::SIZE
    }

    fn encode(&self, out: &mut [u8]) {
        for (unit, chunk) in self.0.iter().zip(out.chunks_exact_mut(ExtentUnit::SIZE)) {
            chunk[..8].copy_from_slice(&unit.start.to_le_bytes());
            chunk[8..].copy_from_slice(&unit.width.to_le_bytes());
        }
    }

    fn units(&self) -> usize {
        self.0.len()
    }

    fn unit_key(&self, key: &Key, unit: usize) -> Key {
        key.with_offset(key.offset().saturating_add(self.unit_offset(unit)))
    }

    fn maxreal_key(&self, key: &Key) -> Key {
        key.with_offset(
            key.offset()
                .saturating_add(self.total_bytes())
                .saturating_sub(1),
        )
    }

    fn maxposs_key(&self, key: &Key) -> Key {
        key.with_offset(u64::MAX)
    }

    fn lookup(&self, key: &Key, target: &Key) -> UnitLookup {
        if !same_stream(key, target) {
            return if target < key {
                UnitLookup::Before
            } else {
                UnitLookup::After
            };
        }
        if target.offset() < key.offset() {
            return UnitLookup::Before;
        }
        let mut delta = target.offset() - key.offset();
        for (i, unit) in self.0.iter().enumerate() {
            if delta < unit.bytes() {
                return UnitLookup::Found(i);
            }
            delta -= unit.bytes();
        }
        UnitLookup::After
    }

    fn mergeable(&self, key: &Key, next_key: &Key, _next: &Self) -> bool {
        same_stream(key, next_key)
            && key.offset().checked_add(self.total_bytes()) == Some(next_key.offset())
    }

    fn overwrite(&mut self, at: usize, units: &Self) -> Result<()> {
        let end = at + units.0.len();
        if end > self.0.len() {
            return Err(Error::invalid("extent write past the last unit"));
        }
        if self.0[at..end]
            .iter()
            .zip(&units.0)
            .any(|(old, new)| old.width != new.width)
        {
            return Err(Error::invalid("extent write must keep unit widths"));
        }
        self.0[at..end].copy_from_slice(&units.0);
        Ok(())
    }
}

impl UnitOps for Extent {
    fn unit_size(&self, _unit: usize) -> usize {
        ExtentUnit::SIZE
    }

    fn split_off(&mut self, at: usize) -> Self {
        Extent(self.0.split_off(at))
    }

    fn insert_units(&mut self, at: usize, units: Self) {
        self.0.splice(at..at, units.0);
    }

    fn remove_units(&mut self, from: usize, count: usize) {
        self.0.drain(from..from + count);
    }
}
