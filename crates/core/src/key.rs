//! The composite key addressing every stored item.
//!
//! # Layout (24 bytes, three big-endian words)
//! ```text
//! Word  Bits          Field
//! ----  ------------  -----
//! 0     63..4 | 3..0  locality | minor type
//! 1     63..60 | 59..0 band   | objectid
//! 2     63..0         offset, or hash (63..8) | generation (7..0)
//! ```
//!
//! Big-endian words make the byte-wise order of an encoded key equal to the
//! numeric order of the decoded key.

use std::cmp::Ordering;
use std::fmt;

/// Size of an encoded key in bytes.
pub const KEY_SIZE: usize = 24;

const MINOR_BITS: u32 = 4;
const MINOR_MASK: u64 = 0xf;
const BAND_SHIFT: u32 = 60;
const OBJECTID_MASK: u64 = (1 << BAND_SHIFT) - 1;
const GENERATION_BITS: u32 = 8;
const GENERATION_MASK: u64 = 0xff;

/// Largest locality value (60 bits).
pub const MAX_LOCALITY: u64 = u64::MAX >> MINOR_BITS;

/// Largest objectid value (60 bits).
pub const MAX_OBJECTID: u64 = OBJECTID_MASK;

/// Largest name hash value (56 bits).
pub const MAX_HASH: u64 = u64::MAX >> GENERATION_BITS;

/// Minor type tag of a key.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyType {
    /// Directory entry.
    FileName = 0,
    /// Stat data of an object.
    StatData = 1,
    /// Extended attribute name.
    AttrName = 2,
    /// Extended attribute body.
    AttrBody = 3,
    /// File body (tail and extent items).
    FileBody = 4,
    /// Any other value found on disk.
    Other = 15,
}

impl KeyType {
    /// Convert from the 4-bit tag, mapping unknown values to `Other`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => KeyType::FileName,
            1 => KeyType::StatData,
            2 => KeyType::AttrName,
            3 => KeyType::AttrBody,
            4 => KeyType::FileBody,
            _ => KeyType::Other,
        }
    }
}

/// A 24-byte key: three ordered 64-bit words.
///
/// The derived `Ord` compares the words lexicographically, which is the total
/// order of the tree. Equal keys are possible (hash collisions of directory
/// entries) and are told apart by an item-specific comparator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Key {
    el: [u64; 3],
}

impl Key {
    /// Build a key from its fields. Values wider than their field are masked.
    pub fn new(locality: u64, minor: KeyType, band: u8, objectid: u64, offset: u64) -> Self {
        let mut key = Key::default();
        key.set_locality(locality);
        key.set_minor(minor);
        key.set_band(band);
        key.set_objectid(objectid);
        key.set_offset(offset);
        key
    }

    /// Build a key from raw words.
    #[inline]
    pub const fn from_words(el: [u64; 3]) -> Self {
        Key { el }
    }

    /// Raw words.
    #[inline]
    pub const fn words(&self) -> [u64; 3] {
        self.el
    }

    /// Smallest possible key.
    #[inline]
    pub const fn minimal() -> Self {
        Key { el: [0; 3] }
    }

    /// Largest possible key.
    #[inline]
    pub const fn maximal() -> Self {
        Key { el: [u64::MAX; 3] }
    }

    /// Key of an object's stat data.
    pub fn stat_data(locality: u64, objectid: u64) -> Self {
        Key::new(locality, KeyType::StatData, 0, objectid, 0)
    }

    /// Key of a byte offset in an object's body.
    pub fn file_body(locality: u64, objectid: u64, offset: u64) -> Self {
        Key::new(locality, KeyType::FileBody, 0, objectid, offset)
    }

    // ========================================================================
    // Field accessors
    // ========================================================================

    #[inline]
    pub fn locality(&self) -> u64 {
        self.el[0] >> MINOR_BITS
    }

    #[inline]
    pub fn set_locality(&mut self, locality: u64) {
        self.el[0] = (locality << MINOR_BITS) | (self.el[0] & MINOR_MASK);
    }

    #[inline]
    pub fn minor(&self) -> KeyType {
        KeyType::from_u8((self.el[0] & MINOR_MASK) as u8)
    }

    #[inline]
    pub fn set_minor(&mut self, minor: KeyType) {
        self.el[0] = (self.el[0] & !MINOR_MASK) | (minor as u64 & MINOR_MASK);
    }

    #[inline]
    pub fn band(&self) -> u8 {
        (self.el[1] >> BAND_SHIFT) as u8
    }

    #[inline]
    pub fn set_band(&mut self, band: u8) {
        self.el[1] = ((band as u64 & 0xf) << BAND_SHIFT) | (self.el[1] & OBJECTID_MASK);
    }

    #[inline]
    pub fn objectid(&self) -> u64 {
        self.el[1] & OBJECTID_MASK
    }

    #[inline]
    pub fn set_objectid(&mut self, objectid: u64) {
        self.el[1] = (self.el[1] & !OBJECTID_MASK) | (objectid & OBJECTID_MASK);
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.el[2]
    }

    #[inline]
    pub fn set_offset(&mut self, offset: u64) {
        self.el[2] = offset;
    }

    /// Copy of this key with a different offset word.
    #[inline]
    pub fn with_offset(&self, offset: u64) -> Self {
        let mut key = *self;
        key.el[2] = offset;
        key
    }

    /// Name hash of a directory entry key (56 bits).
    #[inline]
    pub fn hash(&self) -> u64 {
        self.el[2] >> GENERATION_BITS
    }

    /// Generation of a directory entry key, used to separate hash collisions.
    #[inline]
    pub fn generation(&self) -> u8 {
        (self.el[2] & GENERATION_MASK) as u8
    }

    #[inline]
    pub fn set_hash(&mut self, hash: u64, generation: u8) {
        self.el[2] = ((hash & MAX_HASH) << GENERATION_BITS) | generation as u64;
    }

    /// Equality ignoring the generation byte.
    ///
    /// Keys of directory entries whose names collide share everything but
    /// the generation; a collision run is a maximal sequence of such keys.
    #[inline]
    pub fn short_eq(&self, other: &Key) -> bool {
        self.el[0] == other.el[0]
            && self.el[1] == other.el[1]
            && self.el[2] >> GENERATION_BITS == other.el[2] >> GENERATION_BITS
    }

    /// Whether both keys name the same object (locality, minor, objectid).
    #[inline]
    pub fn same_object(&self, other: &Key) -> bool {
        self.el[0] == other.el[0] && self.objectid() == other.objectid()
    }

    /// Three-way comparison (same as `Ord`).
    #[inline]
    pub fn compare(&self, other: &Key) -> Ordering {
        self.cmp(other)
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode into 24 bytes.
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        let mut out = [0u8; KEY_SIZE];
        self.write_to(&mut out);
        out
    }

    /// Write the encoded key into the first 24 bytes of `data`.
    ///
    /// # Panics
    /// Panics if `data.len() < KEY_SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        for (i, word) in self.el.iter().enumerate() {
            data[i * 8..i * 8 + 8].copy_from_slice(&word.to_be_bytes());
        }
    }

    /// Decode from the first 24 bytes of `data`.
    ///
    /// # Panics
    /// Panics if `data.len() < KEY_SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut el = [0u64; 3];
        for (i, word) in el.iter_mut().enumerate() {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data[i * 8..i * 8 + 8]);
            *word = u64::from_be_bytes(raw);
        }
        Key { el }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:x}:{}:{:x}:{:x}:{:x}",
            self.locality(),
            self.minor() as u8,
            self.band(),
            self.objectid(),
            self.offset()
        )
    }
}
