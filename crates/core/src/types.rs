//! Block identifiers.

use std::fmt;

/// Identifies a block on the device.
///
/// Using `u64` matches the width of a node pointer item body, so a block
/// number can be stored in a branch item without conversion.
///
/// # Example
/// ```
/// use fstree_core::BlockNr;
///
/// let blk = BlockNr::new(42);
/// assert!(blk.is_valid());
/// assert_eq!(blk.0, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockNr(pub u64);

impl BlockNr {
    /// Sentinel for "no block".
    pub const INVALID: BlockNr = BlockNr(u64::MAX);

    /// Create a new BlockNr.
    #[inline]
    pub fn new(blk: u64) -> Self {
        BlockNr(blk)
    }

    /// Check if this block number is not the sentinel value.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Little-endian encoding as stored in node pointer items.
    #[inline]
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Decode from the first 8 bytes of `data`.
    ///
    /// # Panics
    /// Panics if `data.len() < 8`.
    #[inline]
    pub fn from_le_slice(data: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&data[..8]);
        BlockNr(u64::from_le_bytes(raw))
    }
}

impl fmt::Display for BlockNr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Block(INVALID)")
        } else {
            write!(f, "Block({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_nr_invalid() {
        assert!(!BlockNr::INVALID.is_valid());
        assert!(BlockNr::new(0).is_valid());
    }

    #[test]
    fn test_block_nr_display() {
        assert_eq!(format!("{}", BlockNr::new(7)), "Block(7)");
        assert_eq!(format!("{}", BlockNr::INVALID), "Block(INVALID)");
    }

    #[test]
    fn test_block_nr_le_encoding() {
        let blk = BlockNr::new(0x0102_0304_0506_0708);
        let bytes = blk.to_le_bytes();
        assert_eq!(bytes[0], 0x08);
        assert_eq!(BlockNr::from_le_slice(&bytes), blk);
    }
}
