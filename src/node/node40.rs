//! The node40 layout: header, forward-growing item bodies and a
//! backward-growing item header array.
//!
//! ```text
//! ┌────────┬────────┬────────┬─────┬──────────────┬─────┬────────┬────────┐
//! │ header │ body 0 │ body 1 │ ... │  free space  │ ... │ ihdr 1 │ ihdr 0 │
//! └────────┴────────┴────────┴─────┴──────────────┴─────┴────────┴────────┘
//!                                  ^ free_space_start
//! ```
//!
//! `free_space_start + free_space + items * ITEM_HEADER_SIZE == node_size`
//! holds after every primitive.

use std::fmt;

use super::header::{
    body_start_of, plugin_id_of, read_u16, read_u32, read_u64, write_u16, write_u32, write_u64,
    ItemHeader, NodeHeader,
};
use super::{Bias, InsertPoint, Lookup};
use crate::common::format::{
    ITEM_HEADER_SIZE as IH, LEAF_LEVEL, MAX_NODE_SIZE, MIN_NODE_SIZE, NODE_MAGIC,
};
use crate::common::{BlockNr, Error, Key, NodeFormat, Result};
use crate::coord::{Between, Coord};
use crate::item::{Item, ItemKind, UnitLookup};

/// One node: a block-sized buffer in node40 (or checksummed node41) layout.
///
/// Mutators assume a well-formed node and check only what is needed to
/// keep the buffer in bounds. [`Node::check`] is the full validation pass.
#[derive(Clone)]
pub struct Node {
    block: BlockNr,
    data: Box<[u8]>,
}

impl Node {
    /// Create an empty node.
    pub fn new(block: BlockNr, size: usize, level: u8, format: NodeFormat, mkfs_id: u32) -> Self {
        let mut data = vec![0u8; size].into_boxed_slice();
        let start = body_start_of(format);
        NodeHeader {
            plugin_id: plugin_id_of(format),
            items: 0,
            free_space: (size - start) as u16,
            free_space_start: start as u16,
            magic: NODE_MAGIC,
            mkfs_id,
            flush_id: 0,
            flags: 0,
            level,
        }
        .write_to(&mut data);
        Self { block, data }
    }

    /// Free space of an empty node of this size and layout.
    pub fn capacity(size: usize, format: NodeFormat) -> usize {
        size - body_start_of(format)
    }

    /// Adopt a block read from the device.
    ///
    /// # Errors
    /// Returns `Error::Corrupted` if the header is inconsistent or the
    /// checksum of a node41 block does not match.
    pub fn from_bytes(block: BlockNr, data: Box<[u8]>) -> Result<Self> {
        let size = data.len();
        if !(MIN_NODE_SIZE..=MAX_NODE_SIZE).contains(&size) {
            return Err(Error::corrupted(block.0, format!("node of {} bytes", size)));
        }
        let header = NodeHeader::from_bytes(&data);
        if header.magic != NODE_MAGIC {
            return Err(Error::corrupted(block.0, "bad node magic"));
        }
        let format = header
            .format()
            .ok_or_else(|| Error::corrupted(block.0, format!("unknown node plugin {}", header.plugin_id)))?;
        if header.level < LEAF_LEVEL {
            return Err(Error::corrupted(block.0, "node level 0"));
        }
        let fss = header.free_space_start as usize;
        let used = fss + header.free_space as usize + header.items as usize * IH;
        if used != size || fss < body_start_of(format) {
            return Err(Error::corrupted(block.0, "free space accounting mismatch"));
        }
        if format == NodeFormat::Checksummed {
            let stored = read_u32(&data, NodeHeader::OFFSET_CHECKSUM);
            if stored != NodeHeader::compute_checksum(&data) {
                return Err(Error::corrupted(block.0, "node checksum mismatch"));
            }
        }
        let node = Self { block, data };
        node.check_layout()?;
        Ok(node)
    }

    /// Raw block contents.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Stamp the node for write-back and refresh its checksum.
    pub fn seal(&mut self, flush_id: u64) {
        write_u64(&mut self.data, NodeHeader::OFFSET_FLUSH_ID, flush_id);
        if self.format() == NodeFormat::Checksummed {
            let crc = NodeHeader::compute_checksum(&self.data);
            write_u32(&mut self.data, NodeHeader::OFFSET_CHECKSUM, crc);
        }
    }

    // ========================================================================
    // Header accessors
    // ========================================================================

    pub fn header(&self) -> NodeHeader {
        NodeHeader::from_bytes(&self.data)
    }

    #[inline]
    pub fn block(&self) -> BlockNr {
        self.block
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn format(&self) -> NodeFormat {
        if read_u16(&self.data, NodeHeader::OFFSET_PLUGIN_ID) == plugin_id_of(NodeFormat::Checksummed)
        {
            NodeFormat::Checksummed
        } else {
            NodeFormat::Plain
        }
    }

    /// First byte of the body area.
    #[inline]
    pub fn body_start(&self) -> usize {
        body_start_of(self.format())
    }

    #[inline]
    pub fn level(&self) -> u8 {
        self.data[NodeHeader::OFFSET_LEVEL]
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.level() == LEAF_LEVEL
    }

    /// Number of items.
    #[inline]
    pub fn items(&self) -> usize {
        read_u16(&self.data, NodeHeader::OFFSET_ITEMS) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items() == 0
    }

    #[inline]
    pub fn free_space(&self) -> usize {
        read_u16(&self.data, NodeHeader::OFFSET_FREE_SPACE) as usize
    }

    #[inline]
    pub fn free_space_start(&self) -> usize {
        read_u16(&self.data, NodeHeader::OFFSET_FREE_SPACE_START) as usize
    }

    #[inline]
    pub fn flush_id(&self) -> u64 {
        read_u64(&self.data, NodeHeader::OFFSET_FLUSH_ID)
    }

    #[inline]
    pub fn mkfs_id(&self) -> u32 {
        read_u32(&self.data, NodeHeader::OFFSET_MKFS_ID)
    }

    fn set_items(&mut self, items: usize) {
        write_u16(&mut self.data, NodeHeader::OFFSET_ITEMS, items as u16);
    }

    fn set_free_space(&mut self, free: usize) {
        write_u16(&mut self.data, NodeHeader::OFFSET_FREE_SPACE, free as u16);
    }

    fn set_free_space_start(&mut self, fss: usize) {
        write_u16(&mut self.data, NodeHeader::OFFSET_FREE_SPACE_START, fss as u16);
    }

    // ========================================================================
    // Item accessors
    // ========================================================================

    /// Byte position of item header `pos`.
    #[inline]
    fn ih_at(&self, pos: usize) -> usize {
        self.size() - (pos + 1) * IH
    }

    pub fn item_header(&self, pos: usize) -> ItemHeader {
        let at = self.ih_at(pos);
        ItemHeader::from_bytes(&self.data[at..at + IH])
    }

    #[inline]
    pub fn item_offset(&self, pos: usize) -> usize {
        read_u16(&self.data, self.ih_at(pos) + ItemHeader::OFFSET_BODY) as usize
    }

    fn set_item_offset(&mut self, pos: usize, offset: usize) {
        let at = self.ih_at(pos) + ItemHeader::OFFSET_BODY;
        write_u16(&mut self.data, at, offset as u16);
    }

    /// End of item `pos`'s body.
    #[inline]
    fn item_end(&self, pos: usize) -> usize {
        if pos + 1 < self.items() {
            self.item_offset(pos + 1)
        } else {
            self.free_space_start()
        }
    }

    #[inline]
    pub fn item_length(&self, pos: usize) -> usize {
        self.item_end(pos) - self.item_offset(pos)
    }

    pub fn item_body(&self, pos: usize) -> &[u8] {
        &self.data[self.item_offset(pos)..self.item_end(pos)]
    }

    fn item_body_mut(&mut self, pos: usize) -> &mut [u8] {
        let (start, end) = (self.item_offset(pos), self.item_end(pos));
        &mut self.data[start..end]
    }

    /// Key of item `pos`'s first unit.
    #[inline]
    pub fn key_at(&self, pos: usize) -> Key {
        Key::from_bytes(&self.data[self.ih_at(pos)..])
    }

    pub fn set_key_at(&mut self, pos: usize, key: &Key) {
        let at = self.ih_at(pos) + ItemHeader::OFFSET_KEY;
        key.write_to(&mut self.data[at..]);
    }

    /// Smallest key stored in the node.
    pub fn leftmost_key(&self) -> Option<Key> {
        (!self.is_empty()).then(|| self.key_at(0))
    }

    pub fn item_kind(&self, pos: usize) -> Result<ItemKind> {
        let id = read_u16(&self.data, self.ih_at(pos) + ItemHeader::OFFSET_PLUGIN_ID);
        ItemKind::from_plugin_id(id).ok_or_else(|| {
            Error::corrupted(self.block.0, format!("item {} has unknown plugin {}", pos, id))
        })
    }

    /// Decode item `pos`.
    pub fn item(&self, pos: usize) -> Result<Item> {
        if pos >= self.items() {
            return Err(Error::invalid(format!(
                "item {} of a node with {} items",
                pos,
                self.items()
            )));
        }
        let kind = self.item_kind(pos)?;
        Item::decode(kind, self.key_at(pos), self.item_body(pos))
            .map_err(|e| Error::corrupted(self.block.0, format!("item {}: {}", pos, e)))
    }

    /// Number of units in item `pos`, read without decoding the body.
    pub fn units(&self, pos: usize) -> usize {
        let body = self.item_body(pos);
        match self.item_kind(pos) {
            Ok(ItemKind::Tail) => body.len(),
            Ok(ItemKind::Extent) => body.len() / crate::item::ExtentUnit::SIZE,
            Ok(ItemKind::DirEntry) if body.len() >= 2 => read_u16(body, 0) as usize,
            _ => 1,
        }
    }

    /// Child block of branch item `pos`.
    pub fn child(&self, pos: usize) -> Result<BlockNr> {
        self.item(pos)?.child().ok_or_else(|| {
            Error::corrupted(self.block.0, format!("item {} is not a node pointer", pos))
        })
    }

    // ========================================================================
    // Space primitives
    // ========================================================================

    /// Make room for `count` new item headers and `len` body bytes at `pos`.
    ///
    /// With `count > 0` the new items are inserted before item `pos`, all
    /// starting at the same body offset. With `count == 0` item `pos` grows
    /// by `len` bytes at its end. New bytes are zeroed.
    pub fn expand(&mut self, pos: usize, len: usize, count: usize) {
        let items = self.items();
        let fss = self.free_space_start();
        let free = self.free_space();
        debug_assert!(len + count * IH <= free, "expand beyond free space");

        if count == 0 {
            debug_assert!(pos < items);
            let tail = self.item_end(pos);
            self.data.copy_within(tail..fss, tail + len);
            self.data[tail..tail + len].fill(0);
            for i in pos + 1..items {
                let offset = self.item_offset(i);
                self.set_item_offset(i, offset + len);
            }
        } else {
            debug_assert!(pos <= items);
            let start = if pos < items { self.item_offset(pos) } else { fss };
            self.data.copy_within(start..fss, start + len);
            self.data[start..start + len].fill(0);
            for i in pos..items {
                let offset = self.item_offset(i);
                self.set_item_offset(i, offset + len);
            }

            let size = self.size();
            self.data.copy_within(
                size - items * IH..size - pos * IH,
                size - (items + count) * IH,
            );
            for i in pos..pos + count {
                let at = self.ih_at(i);
                ItemHeader {
                    key: Key::minimal(),
                    offset: start as u16,
                    flags: 0,
                    plugin_id: 0,
                }
                .write_to(&mut self.data[at..at + IH]);
            }
            self.set_items(items + count);
        }

        self.set_free_space_start(fss + len);
        self.set_free_space(free - len - count * IH);
    }

    /// Inverse of [`expand`](Self::expand).
    ///
    /// With `count > 0` items `pos..pos + count` are removed together with
    /// their `len` body bytes. With `count == 0` the last `len` bytes of item
    /// `pos` are cut off. Freed bytes are zeroed.
    pub fn shrink(&mut self, pos: usize, len: usize, count: usize) {
        let items = self.items();
        let fss = self.free_space_start();
        let free = self.free_space();

        if count == 0 {
            debug_assert!(pos < items && len <= self.item_length(pos));
            let tail = self.item_end(pos);
            self.data.copy_within(tail..fss, tail - len);
            for i in pos + 1..items {
                let offset = self.item_offset(i);
                self.set_item_offset(i, offset - len);
            }
        } else {
            debug_assert!(pos + count <= items);
            let start = self.item_offset(pos);
            self.data.copy_within(start + len..fss, start);
            for i in pos + count..items {
                let offset = self.item_offset(i);
                self.set_item_offset(i, offset - len);
            }

            let size = self.size();
            self.data.copy_within(
                size - items * IH..size - (pos + count) * IH,
                size - (items - count) * IH,
            );
            self.data[size - items * IH..size - (items - count) * IH].fill(0);
            self.set_items(items - count);
        }

        self.data[fss - len..fss].fill(0);
        self.set_free_space_start(fss - len);
        self.set_free_space(free + len + count * IH);
    }

    // ========================================================================
    // Item mutators
    // ========================================================================

    /// Insert `item` as a new item before item `pos`.
    ///
    /// # Errors
    /// Returns `Error::NoSpace` if the node lacks room for it.
    pub fn insert_item(&mut self, pos: usize, item: &Item) -> Result<()> {
        let len = item.encoded_len();
        if len + IH > self.free_space() {
            return Err(Error::NoSpace);
        }
        self.expand(pos, len, 1);
        let at = self.ih_at(pos);
        let offset = self.item_offset(pos) as u16;
        ItemHeader {
            key: item.key,
            offset,
            flags: 0,
            plugin_id: item.kind().plugin_id(),
        }
        .write_to(&mut self.data[at..at + IH]);
        item.body.encode(self.item_body_mut(pos));
        Ok(())
    }

    /// Rewrite item `pos` with `item`, resizing its body as needed.
    pub fn replace_item(&mut self, pos: usize, item: &Item) -> Result<()> {
        let old = self.item_length(pos);
        let new = item.encoded_len();
        if new > old {
            if new - old > self.free_space() {
                return Err(Error::NoSpace);
            }
            self.expand(pos, new - old, 0);
        } else if new < old {
            self.shrink(pos, old - new, 0);
        }
        self.set_key_at(pos, &item.key);
        let at = self.ih_at(pos) + ItemHeader::OFFSET_PLUGIN_ID;
        write_u16(&mut self.data, at, item.kind().plugin_id());
        item.body.encode(self.item_body_mut(pos));
        Ok(())
    }

    /// Remove item `pos` entirely.
    pub fn remove_item(&mut self, pos: usize) {
        let len = self.item_length(pos);
        self.shrink(pos, len, 1);
    }

    /// Insert `item` at `point`: as a new item or pasted into an existing
    /// one. Re-keys the target item when its first unit changes.
    pub fn insert(&mut self, point: InsertPoint, item: &Item) -> Result<()> {
        match point {
            InsertPoint::Gap { item: pos } => self.insert_item(pos, item),
            InsertPoint::Paste { item: pos, unit } => {
                let mut target = self.item(pos)?;
                if item.paste_len() > self.free_space() {
                    return Err(Error::NoSpace);
                }
                target.insert_units(unit, item.clone())?;
                self.replace_item(pos, &target)
            }
        }
    }

    /// Overwrite units of item `pos` starting at `unit` with `data`.
    ///
    /// The item keeps its size and keys.
    pub fn write(&mut self, pos: usize, unit: usize, data: &Item) -> Result<()> {
        let mut target = self.item(pos)?;
        target.overwrite(unit, data)?;
        if target.encoded_len() != self.item_length(pos) {
            return Err(Error::invalid("write must not change the item size"));
        }
        target.body.encode(self.item_body_mut(pos));
        Ok(())
    }

    /// Remove `count` units of item `pos` starting at `unit`.
    ///
    /// Removing every unit removes the item.
    pub fn remove(&mut self, pos: usize, unit: usize, count: usize) -> Result<()> {
        if pos >= self.items() {
            return Err(Error::invalid(format!("no item {} to remove from", pos)));
        }
        let units = self.units(pos);
        if unit + count > units || count == 0 {
            return Err(Error::invalid(format!(
                "remove of units {}..{} from an item of {}",
                unit,
                unit + count,
                units
            )));
        }
        if count == units {
            self.remove_item(pos);
            return Ok(());
        }
        let mut target = self.item(pos)?;
        target.remove_units(unit, count)?;
        self.replace_item(pos, &target)
    }

    /// Remove every unit of item `pos` from `unit` on.
    pub fn truncate(&mut self, pos: usize, unit: usize) -> Result<()> {
        if pos >= self.items() {
            return Err(Error::invalid(format!("no item {} to truncate", pos)));
        }
        let units = self.units(pos);
        self.remove(pos, unit, units.saturating_sub(unit))
    }

    /// Fuse item `right` into item `left` (`right == left + 1`).
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the items are not adjacent or not
    /// mergeable.
    pub fn merge(&mut self, left: usize, right: usize) -> Result<()> {
        if right != left + 1 || right >= self.items() {
            return Err(Error::invalid(format!("cannot merge items {} and {}", left, right)));
        }
        let mut first = self.item(left)?;
        let second = self.item(right)?;
        if !first.mergeable(&second) {
            return Err(Error::invalid(format!(
                "items {} and {} are not mergeable",
                left, right
            )));
        }
        first.append(second)?;
        self.remove_item(right);
        self.replace_item(left, &first)
    }

    // ========================================================================
    // Lookup and placement
    // ========================================================================

    /// Binary search for `key`, positioning `coord` (whose node is left
    /// untouched).
    ///
    /// With [`Bias::Exact`] a miss leaves `coord` at the insertion point for
    /// `key`. With [`Bias::Nearest`] it lands on the unit with the greatest
    /// key not above `key`, if there is one.
    pub fn lookup(&self, key: &Key, bias: Bias, coord: &mut Coord) -> Result<Lookup> {
        coord.unit = 0;
        coord.item = 0;
        let count = self.items();
        if count == 0 {
            coord.between = Between::EmptyNode;
            return Ok(Lookup::Absent);
        }

        // Number of items whose key is not above the target.
        let (mut lo, mut hi) = (0, count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid) <= *key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == 0 {
            coord.between = Between::BeforeItem;
            return Ok(Lookup::Absent);
        }

        let pos = lo - 1;
        coord.item = pos;
        if self.key_at(pos) == *key {
            coord.between = Between::AtUnit;
            return Ok(Lookup::Present);
        }

        let item = self.item(pos)?;
        let last = item.units() - 1;
        match item.lookup(key) {
            UnitLookup::Found(unit) => {
                coord.unit = unit;
                coord.between = Between::AtUnit;
                return Ok(Lookup::Present);
            }
            UnitLookup::Between(unit) => {
                coord.unit = unit;
                coord.between = match bias {
                    Bias::Exact => Between::AfterUnit,
                    Bias::Nearest => Between::AtUnit,
                };
            }
            UnitLookup::After => {
                if bias == Bias::Exact && *key > item.maxposs_key() {
                    coord.between = Between::AfterItem;
                } else {
                    coord.unit = last;
                    coord.between = match bias {
                        Bias::Exact => Between::AfterUnit,
                        Bias::Nearest => Between::AtUnit,
                    };
                }
            }
            UnitLookup::Before => {
                coord.between = Between::BeforeItem;
            }
        }
        Ok(Lookup::Absent)
    }

    /// Turn a lookup position into an insertion point for `item`.
    ///
    /// Prefers pasting into a neighbouring item that `item` continues, so
    /// that no two mergeable items end up side by side.
    ///
    /// # Errors
    /// - `Error::AlreadyExists` if `coord` sits on an existing unit
    /// - `Error::InvalidArgument` if `item` cannot go inside the item
    ///   `coord` points into
    pub fn resolve_place(&self, coord: &Coord, item: &Item) -> Result<InsertPoint> {
        match coord.between {
            Between::EmptyNode => Ok(InsertPoint::Gap { item: 0 }),
            Between::Invalid => Err(Error::invalid("insert at an invalid coordinate")),
            Between::AtUnit => Err(Error::AlreadyExists),
            Between::BeforeItem => Ok(self.place_in_gap(coord.item, item)),
            Between::AfterItem => Ok(self.place_in_gap(coord.item + 1, item)),
            Between::BeforeUnit | Between::AfterUnit => {
                let pos = coord.item;
                let unit = if coord.between == Between::AfterUnit {
                    coord.unit + 1
                } else {
                    coord.unit
                };
                if unit == 0 {
                    return Ok(self.place_in_gap(pos, item));
                }
                if unit >= self.units(pos) {
                    return Ok(self.place_in_gap(pos + 1, item));
                }
                let existing = self.item(pos)?;
                if existing.unit(unit - 1)?.mergeable(item) {
                    Ok(InsertPoint::Paste { item: pos, unit })
                } else {
                    Err(Error::invalid(format!(
                        "cannot insert a {} item inside a {} item",
                        item.kind(),
                        existing.kind()
                    )))
                }
            }
        }
    }

    /// Insertion point for `item` placed before item `gap`, pasting into a
    /// neighbour when `item` continues it.
    pub fn place_in_gap(&self, gap: usize, item: &Item) -> InsertPoint {
        if gap > 0 {
            if let Ok(left) = self.item(gap - 1) {
                if left.mergeable(item) {
                    return InsertPoint::Paste {
                        item: gap - 1,
                        unit: left.units(),
                    };
                }
            }
        }
        if gap < self.items() {
            if let Ok(right) = self.item(gap) {
                if item.mergeable(&right) {
                    return InsertPoint::Paste { item: gap, unit: 0 };
                }
            }
        }
        InsertPoint::Gap { item: gap }
    }

    /// Bytes `item` takes when inserted at `point`.
    pub fn space_for(point: InsertPoint, item: &Item) -> usize {
        match point {
            InsertPoint::Gap { .. } => item.encoded_len() + IH,
            InsertPoint::Paste { .. } => item.paste_len(),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("block", &self.block)
            .field("level", &self.level())
            .field("items", &self.items())
            .field("free_space", &self.free_space())
            .finish()
    }
}
