//! Item kinds and the operations every kind provides.
//!
//! An item is a key plus a body whose binary layout is private to its kind.
//! Bodies subdivide into *units*: one byte of a tail, one extent, one
//! directory entry. The node and tree layers only see [`Item`] and the
//! capability traits, never a concrete layout.
//!
//! - [`ItemOps`] - implemented by every kind (decode, keys, lookup)
//! - [`UnitOps`] - implemented by kinds whose units can be split, shifted
//!   and removed one at a time (tail, extent, directory entry)
//! - [`ItemBody`] - closed enum over the kinds, dispatching by plugin id

mod dir_entry;
mod extent;
mod node_ptr;
mod stat_data;
mod tail;

use std::fmt;

use crate::common::{BlockNr, Error, Key, Result};

pub use dir_entry::{DirEntries, DirEntry, SHORT_NAME_MAX};
pub use extent::{Extent, ExtentUnit};
pub use node_ptr::NodePtr;
pub use stat_data::StatData;
pub use tail::Tail;

// ============================================================================
// Kinds
// ============================================================================

/// The closed set of item kinds, tagged with their on-disk plugin id.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    StatData = 0,
    DirEntry = 2,
    NodePtr = 3,
    Extent = 5,
    Tail = 6,
}

impl ItemKind {
    /// Map a plugin id read from an item header.
    pub fn from_plugin_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(ItemKind::StatData),
            2 => Some(ItemKind::DirEntry),
            3 => Some(ItemKind::NodePtr),
            5 => Some(ItemKind::Extent),
            6 => Some(ItemKind::Tail),
            _ => None,
        }
    }

    #[inline]
    pub fn plugin_id(self) -> u16 {
        self as u16
    }

    /// Whether units of this kind can be moved individually.
    #[inline]
    pub fn has_units(self) -> bool {
        matches!(self, ItemKind::DirEntry | ItemKind::Extent | ItemKind::Tail)
    }

    /// Whether distinct units of this kind may carry equal short keys.
    #[inline]
    pub fn allows_collisions(self) -> bool {
        self == ItemKind::DirEntry
    }

    /// Whether this is the branch item of internal nodes.
    #[inline]
    pub fn is_branch(self) -> bool {
        self == ItemKind::NodePtr
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemKind::StatData => "stat-data",
            ItemKind::DirEntry => "dir-entry",
            ItemKind::NodePtr => "node-ptr",
            ItemKind::Extent => "extent",
            ItemKind::Tail => "tail",
        };
        f.write_str(name)
    }
}

/// Where a key falls relative to the units of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitLookup {
    /// The key addresses this unit.
    Found(usize),
    /// The key lies after this unit and before the next one.
    Between(usize),
    /// The key lies before the first unit.
    Before,
    /// The key lies after the last unit.
    After,
}

// ============================================================================
// Capability traits
// ============================================================================

/// Operations every item kind provides.
pub trait ItemOps: Sized + Clone {
    const KIND: ItemKind;

    /// Decode a body. `key` is the key of the item's first unit.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if `data` is not a valid body.
    fn decode(key: &Key, data: &[u8]) -> Result<Self>;

    /// Size of the encoded body.
    fn encoded_len(&self) -> usize;

    /// Encode into `out` (`out.len() == encoded_len()`).
    fn encode(&self, out: &mut [u8]);

    fn units(&self) -> usize {
        1
    }

    /// Key of unit `unit`.
    fn unit_key(&self, key: &Key, unit: usize) -> Key {
        let _ = unit;
        *key
    }

    /// Largest key actually stored in the item.
    fn maxreal_key(&self, key: &Key) -> Key {
        *key
    }

    /// Largest key the item could hold if it grew.
    fn maxposs_key(&self, key: &Key) -> Key {
        self.maxreal_key(key)
    }

    /// Locate `target` among the units.
    fn lookup(&self, key: &Key, target: &Key) -> UnitLookup {
        match target.cmp(key) {
            std::cmp::Ordering::Less => UnitLookup::Before,
            std::cmp::Ordering::Equal => UnitLookup::Found(0),
            std::cmp::Ordering::Greater => UnitLookup::After,
        }
    }

    /// Whether `next` (starting at `next_key`) continues this item.
    fn mergeable(&self, key: &Key, next_key: &Key, next: &Self) -> bool {
        let _ = (key, next_key, next);
        false
    }

    /// Overwrite units starting at `at` with `units`, keeping keys intact.
    fn overwrite(&mut self, at: usize, units: &Self) -> Result<()> {
        let _ = (at, units);
        Err(Error::invalid(format!("{} items cannot be overwritten", Self::KIND)))
    }
}

/// Unit-level operations of kinds that can be split and shifted.
pub trait UnitOps: ItemOps {
    /// Bytes of the body not attributed to any unit.
    const OVERHEAD: usize = 0;

    /// Encoded size of unit `unit`.
    fn unit_size(&self, unit: usize) -> usize;

    /// Keep units `..at`, return units `at..`.
    fn split_off(&mut self, at: usize) -> Self;

    /// Insert all units of `units` before unit `at`.
    fn insert_units(&mut self, at: usize, units: Self);

    fn remove_units(&mut self, from: usize, count: usize);
}

// ============================================================================
// Item bodies
// ============================================================================

/// A decoded body of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemBody {
    StatData(StatData),
    NodePtr(NodePtr),
    Tail(Tail),
    Extent(Extent),
    DirEntry(DirEntries),
}

macro_rules! dispatch {
    ($value:expr, $body:ident => $e:expr) => {
        match $value {
            ItemBody::StatData($body) => $e,
            ItemBody::NodePtr($body) => $e,
            ItemBody::Tail($body) => $e,
            ItemBody::Extent($body) => $e,
            ItemBody::DirEntry($body) => $e,
        }
    };
}

macro_rules! dispatch_units {
    ($value:expr, $body:ident => $e:expr) => {
        match $value {
            ItemBody::Tail($body) => Ok($e),
            ItemBody::Extent($body) => Ok($e),
            ItemBody::DirEntry($body) => Ok($e),
            other => Err(Error::invalid(format!(
                "{} items have no movable units",
                other.kind()
            ))),
        }
    };
}

impl ItemBody {
    /// Decode a body stored under plugin id `kind`.
    pub fn decode(kind: ItemKind, key: &Key, data: &[u8]) -> Result<Self> {
        Ok(match kind {
            ItemKind::StatData => ItemBody::StatData(StatData::decode(key, data)?),
            ItemKind::NodePtr => ItemBody::NodePtr(NodePtr::decode(key, data)?),
            ItemKind::Tail => ItemBody::Tail(Tail::decode(key, data)?),
            ItemKind::Extent => ItemBody::Extent(Extent::decode(key, data)?),
            ItemKind::DirEntry => ItemBody::DirEntry(DirEntries::decode(key, data)?),
        })
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            ItemBody::StatData(_) => ItemKind::StatData,
            ItemBody::NodePtr(_) => ItemKind::NodePtr,
            ItemBody::Tail(_) => ItemKind::Tail,
            ItemBody::Extent(_) => ItemKind::Extent,
            ItemBody::DirEntry(_) => ItemKind::DirEntry,
        }
    }

    pub fn encoded_len(&self) -> usize {
        dispatch!(self, b => b.encoded_len())
    }

    pub fn encode(&self, out: &mut [u8]) {
        dispatch!(self, b => b.encode(out))
    }

    pub fn units(&self) -> usize {
        dispatch!(self, b => b.units())
    }

    fn overhead(&self) -> usize {
        match self {
            ItemBody::DirEntry(_) => DirEntries::OVERHEAD,
            ItemBody::Tail(_) => Tail::OVERHEAD,
            ItemBody::Extent(_) => Extent::OVERHEAD,
            _ => 0,
        }
    }
}

// ============================================================================
// Item
// ============================================================================

/// An item: the key of its first unit plus a decoded body.
///
/// # Example
/// ```
/// use fstree::item::{Item, ItemKind};
/// use fstree::Key;
///
/// let item = Item::tail(Key::file_body(1, 2, 100), b"hello".to_vec());
/// assert_eq!(item.kind(), ItemKind::Tail);
/// assert_eq!(item.units(), 5);
/// assert_eq!(item.maxreal_key().offset(), 104);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: Key,
    pub body: ItemBody,
}

impl Item {
    pub fn new(key: Key, body: ItemBody) -> Self {
        Self { key, body }
    }

    pub fn stat_data(key: Key, sd: StatData) -> Self {
        Self::new(key, ItemBody::StatData(sd))
    }

    pub fn node_ptr(key: Key, block: BlockNr) -> Self {
        Self::new(key, ItemBody::NodePtr(NodePtr(block)))
    }

    pub fn tail(key: Key, bytes: Vec<u8>) -> Self {
        Self::new(key, ItemBody::Tail(Tail(bytes)))
    }

    pub fn extent(key: Key, units: Vec<ExtentUnit>) -> Self {
        Self::new(key, ItemBody::Extent(Extent(units)))
    }

    /// An item holding one directory entry, keyed by the entry's key.
    pub fn dir_entry(entry: DirEntry) -> Self {
        Self::new(entry.key, ItemBody::DirEntry(DirEntries(vec![entry])))
    }

    /// Decode the item stored under `kind` with first key `key`.
    pub fn decode(kind: ItemKind, key: Key, data: &[u8]) -> Result<Self> {
        Ok(Self::new(key, ItemBody::decode(kind, &key, data)?))
    }

    #[inline]
    pub fn kind(&self) -> ItemKind {
        self.body.kind()
    }

    #[inline]
    pub fn units(&self) -> usize {
        self.body.units()
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.body.encoded_len()
    }

    /// Bytes added to an existing item when all units of `self` are pasted
    /// into it.
    pub fn paste_len(&self) -> usize {
        self.encoded_len() - self.body.overhead()
    }

    pub fn unit_key(&self, unit: usize) -> Key {
        dispatch!(&self.body, b => b.unit_key(&self.key, unit))
    }

    pub fn maxreal_key(&self) -> Key {
        dispatch!(&self.body, b => b.maxreal_key(&self.key))
    }

    pub fn maxposs_key(&self) -> Key {
        dispatch!(&self.body, b => b.maxposs_key(&self.key))
    }

    pub fn lookup(&self, target: &Key) -> UnitLookup {
        dispatch!(&self.body, b => b.lookup(&self.key, target))
    }

    /// Whether `next` continues `self`, so that both may be one item.
    pub fn mergeable(&self, next: &Item) -> bool {
        match (&self.body, &next.body) {
            (ItemBody::StatData(a), ItemBody::StatData(b)) => a.mergeable(&self.key, &next.key, b),
            (ItemBody::NodePtr(a), ItemBody::NodePtr(b)) => a.mergeable(&self.key, &next.key, b),
            (ItemBody::Tail(a), ItemBody::Tail(b)) => a.mergeable(&self.key, &next.key, b),
            (ItemBody::Extent(a), ItemBody::Extent(b)) => a.mergeable(&self.key, &next.key, b),
            (ItemBody::DirEntry(a), ItemBody::DirEntry(b)) => {
                a.mergeable(&self.key, &next.key, b)
            }
            _ => false,
        }
    }

    /// Encoded size of unit `unit` (the whole body for single-unit kinds).
    pub fn unit_size(&self, unit: usize) -> usize {
        match &self.body {
            ItemBody::Tail(b) => b.unit_size(unit),
            ItemBody::Extent(b) => b.unit_size(unit),
            ItemBody::DirEntry(b) => b.unit_size(unit),
            other => other.encoded_len(),
        }
    }

    /// Bytes taken by the body beyond its units.
    #[inline]
    pub fn overhead(&self) -> usize {
        self.body.overhead()
    }

    /// Count how many units can leave this item within `room` bytes.
    ///
    /// Units are taken from the front (or from the end if `from_end`), at
    /// most `limit` of them. Returns the unit count and their encoded size.
    pub fn prepare_shift(&self, from_end: bool, limit: usize, room: usize) -> (usize, usize) {
        let total = self.units();
        let mut count = 0;
        let mut bytes = 0;
        while count < limit.min(total) {
            let unit = if from_end { total - 1 - count } else { count };
            let size = self.unit_size(unit);
            if bytes + size > room {
                break;
            }
            bytes += size;
            count += 1;
        }
        (count, bytes)
    }

    /// Keep units `..at` and return units `at..` as a new item.
    ///
    /// Splitting at `units()` leaves `self` whole and returns an empty item
    /// keyed by the last real key.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for kinds without movable units and
    /// for `at` past the last unit.
    pub fn split_off(&mut self, at: usize) -> Result<Item> {
        let units = self.units();
        if at > units {
            return Err(Error::invalid(format!(
                "split at unit {} of an item of {}",
                at, units
            )));
        }
        let key = if at < units {
            self.unit_key(at)
        } else {
            self.maxreal_key()
        };
        let body = dispatch_units!(&mut self.body, b => ItemBody::from(b.split_off(at)))?;
        Ok(Item::new(key, body))
    }

    /// Insert the units of `other` before unit `at`.
    pub fn insert_units(&mut self, at: usize, other: Item) -> Result<()> {
        if at == 0 {
            self.key = other.key;
        }
        match (&mut self.body, other.body) {
            (ItemBody::Tail(a), ItemBody::Tail(b)) => a.insert_units(at, b),
            (ItemBody::Extent(a), ItemBody::Extent(b)) => a.insert_units(at, b),
            (ItemBody::DirEntry(a), ItemBody::DirEntry(b)) => a.insert_units(at, b),
            (a, b) => {
                return Err(Error::invalid(format!(
                    "cannot paste {} units into a {} item",
                    b.kind(),
                    a.kind()
                )))
            }
        }
        Ok(())
    }

    /// Append the units of `other`.
    pub fn append(&mut self, other: Item) -> Result<()> {
        let end = self.units();
        self.insert_units(end, other)
    }

    /// Remove `count` units starting at `from`; re-keys if unit 0 goes.
    pub fn remove_units(&mut self, from: usize, count: usize) -> Result<()> {
        if from + count > self.units() {
            return Err(Error::invalid(format!(
                "remove of units {}..{} from an item of {}",
                from,
                from + count,
                self.units()
            )));
        }
        if from == 0 && count < self.units() {
            self.key = self.unit_key(count);
        }
        dispatch_units!(&mut self.body, b => b.remove_units(from, count))
    }

    /// A copy of unit `unit` as a single-unit item.
    pub fn unit(&self, unit: usize) -> Result<Item> {
        if unit >= self.units() {
            return Err(Error::invalid(format!("unit {} out of range", unit)));
        }
        if !self.kind().has_units() {
            return Ok(self.clone());
        }
        let mut copy = self.clone();
        let mut rest = copy.split_off(unit)?;
        let extra = rest.units() - 1;
        rest.remove_units(1, extra)?;
        Ok(rest)
    }

    /// Overwrite units starting at `unit` with those of `data`.
    pub fn overwrite(&mut self, unit: usize, data: &Item) -> Result<()> {
        match (&mut self.body, &data.body) {
            (ItemBody::StatData(a), ItemBody::StatData(b)) => a.overwrite(unit, b),
            (ItemBody::NodePtr(a), ItemBody::NodePtr(b)) => a.overwrite(unit, b),
            (ItemBody::Tail(a), ItemBody::Tail(b)) => a.overwrite(unit, b),
            (ItemBody::Extent(a), ItemBody::Extent(b)) => a.overwrite(unit, b),
            (ItemBody::DirEntry(a), ItemBody::DirEntry(b)) => a.overwrite(unit, b),
            (a, b) => Err(Error::invalid(format!(
                "cannot write {} data over a {} item",
                b.kind(),
                a.kind()
            ))),
        }
    }

    /// Child block of a branch item.
    pub fn child(&self) -> Option<BlockNr> {
        match &self.body {
            ItemBody::NodePtr(ptr) => Some(ptr.0),
            _ => None,
        }
    }
}

impl From<Tail> for ItemBody {
    fn from(body: Tail) -> Self {
        ItemBody::Tail(body)
    }
}

impl From<Extent> for ItemBody {
    fn from(body: Extent) -> Self {
        ItemBody::Extent(body)
    }
}

impl From<DirEntries> for ItemBody {
    fn from(body: DirEntries) -> Self {
        ItemBody::DirEntry(body)
    }
}
