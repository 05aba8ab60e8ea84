//! Stat-data items: the fixed attributes of one object.

use super::{ItemKind, ItemOps};
use crate::common::{Error, Key, Result};

/// Object attributes.
///
/// # Layout (34 bytes, little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       2     mode
/// 2       4     nlink
/// 6       4     uid
/// 10      4     gid
/// 14      8     size
/// 22      4     atime
/// 26      4     mtime
/// 30      4     ctime
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatData {
    pub mode: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
}

impl StatData {
    pub const SIZE: usize = 34;
}

impl ItemOps for StatData {
    const KIND: ItemKind = ItemKind::StatData;

    fn decode(_key: &Key, data: &[u8]) -> Result<Self> {
        if data.len() != Self::SIZE {
            return Err(Error::invalid(format!(
                "stat-data body of {} bytes",
                data.len()
            )));
        }
        let u32_at = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        let mut size = [0u8; 8];
        size.copy_from_slice(&data[14..22]);

        Ok(Self {
            mode: u16::from_le_bytes([data[0], data[1]]),
            nlink: u32_at(2),
            uid: u32_at(6),
            gid: u32_at(10),
            size: u64::from_le_bytes(size),
            atime: u32_at(22),
            mtime: u32_at(26),
            ctime: u32_at(30),
        })
    }

    fn encoded_len(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.mode.to_le_bytes());
        out[2..6].copy_from_slice(&self.nlink.to_le_bytes());
        out[6..10].copy_from_slice(&self.uid.to_le_bytes());
        out[10..14].copy_from_slice(&self.gid.to_le_bytes());
        out[14..22].copy_from_slice(&self.size.to_le_bytes());
        out[22..26].copy_from_slice(&self.atime.to_le_bytes());
        out[26..30].copy_from_slice(&self.mtime.to_le_bytes());
        out[30..34].copy_from_slice(&self.ctime.to_le_bytes());
    }

    fn overwrite(&mut self, at: usize, units: &Self) -> Result<()> {
        if at != 0 {
            return Err(Error::invalid("stat-data has a single unit"));
        }
        *self = *units;
        Ok(())
    }
}
