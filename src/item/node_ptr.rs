//! Branch items: pointers from an internal node to a child block.

use super::{ItemKind, ItemOps};
use crate::common::{BlockNr, Error, Key, Result};

/// Child block number, stored as 8 little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePtr(pub BlockNr);

impl NodePtr {
    pub const SIZE: usize = 8;
}

impl ItemOps for NodePtr {
    const KIND: ItemKind = ItemKind::NodePtr;

    fn decode(_key: &Key, data: &[u8]) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(Error::invalid(format!(
                "node pointer body of {} bytes",
                data.len()
            )));
        }
        Ok(NodePtr(BlockNr::from_le_slice(data)))
    }

    fn encoded_len(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, out: &mut [u8]) {
        out[..Self::SIZE].copy_from_slice(&self.0.to_le_bytes());
    }

    fn overwrite(&mut self, at: usize, units: &Self) -> Result<()> {
        if at != 0 {
            return Err(Error::invalid("node pointer has a single unit"));
        }
        *self = *units;
        Ok(())
    }
}
