//! Directory entry items.
//!
//! One item holds the entries of one directory that fall into the same node,
//! ordered by entry key. An entry key is built from the directory's objectid
//! and the name:
//! - names of up to [`SHORT_NAME_MAX`] bytes are packed into the hash field
//!   and not stored in the body
//! - longer names are hashed (56-bit FNV-1a), marked with band 1 and stored
//!   NUL-terminated in the body
//!
//! Distinct long names may hash alike; their keys then differ only in the
//! generation byte and are told apart by comparing names.
//!
//! # Body layout (little-endian)
//! ```text
//! u16 count
//! count × { word1 u64, word2 u64, body offset u16 }   entry headers
//! count × { target locality u64, target objectid u64, [name, 0] }
//! ```

use super::{ItemKind, ItemOps, UnitLookup, UnitOps};
use crate::common::{Error, Key, KeyType, Result};

/// Longest name stored inside the key itself.
pub const SHORT_NAME_MAX: usize = 7;

/// Longest name accepted.
pub const MAX_NAME_LEN: usize = 255;

const LONG_NAME_BAND: u8 = 1;
const COUNT_SIZE: usize = 2;
const ENTRY_HEADER_SIZE: usize = 18;
const TARGET_SIZE: usize = 16;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// One name in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub key: Key,
    pub name: Vec<u8>,
    pub target_locality: u64,
    pub target_objectid: u64,
}

impl DirEntry {
    /// Entry `name` of directory `dir` pointing at an object.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for an empty name, a name with a NUL
    /// byte, or one longer than [`MAX_NAME_LEN`].
    pub fn new(
        dir: u64,
        name: &[u8],
        target_locality: u64,
        target_objectid: u64,
        generation: u8,
    ) -> Result<Self> {
        Ok(Self {
            key: Self::entry_key(dir, name, generation)?,
            name: name.to_vec(),
            target_locality,
            target_objectid,
        })
    }

    /// Key of entry `name` in directory `dir`.
    pub fn entry_key(dir: u64, name: &[u8], generation: u8) -> Result<Key> {
        validate_name(name)?;
        let long = name.len() > SHORT_NAME_MAX;
        let band = if long { LONG_NAME_BAND } else { 0 };
        let mut key = Key::new(dir, KeyType::FileName, band, 0, 0);
        key.set_hash(name_hash(name), generation);
        Ok(key)
    }

    /// Whether the name is stored in the body rather than the key.
    #[inline]
    pub fn is_long(&self) -> bool {
        self.name.len() > SHORT_NAME_MAX
    }

    /// Stat-data key of the object the entry names.
    pub fn target_key(&self) -> Key {
        Key::stat_data(self.target_locality, self.target_objectid)
    }

    /// Collision comparator: whether this entry carries `name`.
    #[inline]
    pub fn has_name(&self, name: &[u8]) -> bool {
        self.name == name
    }

    fn body_len(&self) -> usize {
        TARGET_SIZE + if self.is_long() { self.name.len() + 1 } else { 0 }
    }
}

fn validate_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains(&0) {
        return Err(Error::invalid(format!(
            "bad directory entry name {:?}",
            String::from_utf8_lossy(name)
        )));
    }
    Ok(())
}

/// 56-bit hash of a name; short names are packed verbatim.
fn name_hash(name: &[u8]) -> u64 {
    if name.len() <= SHORT_NAME_MAX {
        let mut packed = 0u64;
        for i in 0..SHORT_NAME_MAX {
            packed <<= 8;
            if let Some(&b) = name.get(i) {
                packed |= b as u64;
            }
        }
        packed
    } else {
        let hash = name.iter().fold(FNV_OFFSET, |h, &b| {
            (h ^ b as u64).wrapping_mul(FNV_PRIME)
        });
        hash >> 8
    }
}

fn unpack_short_name(hash: u64) -> Vec<u8> {
    (0..SHORT_NAME_MAX)
        .map(|i| ((hash >> (8 * (SHORT_NAME_MAX - 1 - i))) & 0xff) as u8)
        .take_while(|&b| b != 0)
        .collect()
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(raw)
}

/// The entries of one directory item, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntries(pub Vec<DirEntry>);

impl ItemOps for DirEntries {
    const KIND: ItemKind = ItemKind::DirEntry;

    fn decode(key: &Key, data: &[u8]) -> Result<Self> {
        if data.len() < COUNT_SIZE {
            return Err(Error::invalid("directory item without entry count"));
        }
        let count = u16::from_le_bytes([data[0], data[1]]) as usize;
        let headers_end = COUNT_SIZE + count * ENTRY_HEADER_SIZE;
        if count == 0 || headers_end > data.len() {
            return Err(Error::invalid(format!(
                "directory item of {} bytes claims {} entries",
                data.len(),
                count
            )));
        }

        let word0 = key.words()[0];
        let offset_of = |i: usize| {
            let at = COUNT_SIZE + i * ENTRY_HEADER_SIZE + 16;
            u16::from_le_bytes([data[at], data[at + 1]]) as usize
        };

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let header = COUNT_SIZE + i * ENTRY_HEADER_SIZE;
            let entry_key =
                Key::from_words([word0, read_u64(data, header), read_u64(data, header + 8)]);
            let start = offset_of(i);
            let end = if i + 1 < count {
                offset_of(i + 1)
            } else {
                data.len()
            };
            if start < headers_end || start + TARGET_SIZE > end || end > data.len() {
                return Err(Error::invalid(format!("directory entry {} out of bounds", i)));
            }

            let name = if entry_key.band() == LONG_NAME_BAND {
                let stored = &data[start + TARGET_SIZE..end];
                match stored.split_last() {
                    Some((&0, name)) if name.len() > SHORT_NAME_MAX => name.to_vec(),
                    _ => return Err(Error::invalid("malformed long directory entry name")),
                }
            } else {
                if end != start + TARGET_SIZE {
                    return Err(Error::invalid("short directory entry with a stored name"));
                }
                unpack_short_name(entry_key.hash())
            };
            if name.is_empty() {
                return Err(Error::invalid("directory entry with an empty name"));
            }

            entries.push(DirEntry {
                key: entry_key,
                name,
                target_locality: read_u64(data, start),
                target_objectid: read_u64(data, start + 8),
            });
        }
        Ok(DirEntries(entries))
    }

    fn encoded_len(&self) -> usize {
        Self::OVERHEAD + (0..self.0.len()).map(|u| self.unit_size(u)).sum::<usize>()
    }

    fn encode(&self, out: &mut [u8]) {
        out[..COUNT_SIZE].copy_from_slice(&(self.0.len() as u16).to_le_bytes());
        let mut body = COUNT_SIZE + self.0.len() * ENTRY_HEADER_SIZE;
        for (i, entry) in self.0.iter().enumerate() {
            let header = COUNT_SIZE + i * ENTRY_HEADER_SIZE;
            let words = entry.key.words();
            out[header..header + 8].copy_from_slice(&words[1].to_le_bytes());
            out[header + 8..header + 16].copy_from_slice(&words[2].to_le_bytes());
            out[header + 16..header + 18].copy_from_slice(&(body as u16).to_le_bytes());

            out[body..body + 8].copy_from_slice(&entry.target_locality.to_le_bytes());
            out[body + 8..body + 16].copy_from_slice(&entry.target_objectid.to_le_bytes());
            if entry.is_long() {
                let name_at = body + TARGET_SIZE;
                out[name_at..name_at + entry.name.len()].copy_from_slice(&entry.name);
                out[name_at + entry.name.len()] = 0;
            }
            body += entry.body_len();
        }
    }

    fn units(&self) -> usize {
        self.0.len()
    }

    fn unit_key(&self, _key: &Key, unit: usize) -> Key {
        self.0[unit].key
    }

    fn maxreal_key(&self, key: &Key) -> Key {
        self.0.last().map_or(*key, |e| e.key)
    }

    fn maxposs_key(&self, key: &Key) -> Key {
        Key::from_words([key.words()[0], u64::MAX, u64::MAX])
    }

    fn lookup(&self, _key: &Key, target: &Key) -> UnitLookup {
        let pos = self.0.partition_point(|e| e.key <= *target);
        if pos == 0 {
            return UnitLookup::Before;
        }
        let unit = pos - 1;
        if self.0[unit].key == *target {
            UnitLookup::Found(unit)
        } else if pos == self.0.len() {
            UnitLookup::After
        } else {
            UnitLookup::Between(unit)
        }
    }

    fn mergeable(&self, key: &Key, next_key: &Key, _next: &Self) -> bool {
        key.words()[0] == next_key.words()[0]
    }
}

impl UnitOps for DirEntries {
    const OVERHEAD: usize = COUNT_SIZE;

    fn unit_size(&self, unit: usize) -> usize {
        ENTRY_HEADER_SIZE + self.0[unit].body_len()
    }

    fn split_off(&mut self, at: usize) -> Self {
        DirEntries(self.0.split_off(at))
    }

    fn insert_units(&mut self, at: usize, units: Self) {
        self.0.splice(at..at, units.0);
    }

    fn remove_units(&mut self, from: usize, count: usize) {
        self.0.drain(from..from + count);
    }
}
