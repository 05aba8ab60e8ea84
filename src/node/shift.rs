//! Moving items and units between neighbouring nodes.
//!
//! A shift runs three passes in order:
//! 1. Boundary merge - units of the boundary item go into the adjoining item
//!    of the destination when the two are mergeable.
//! 2. Whole items - entire items move while the destination has room.
//! 3. Boundary split - leftover room is filled either by another merge or
//!    by a new item holding part of the boundary item's units.
//!
//! When the hint carries an insertion point, only the part of the source on
//! the shift's side of the point may move. If all of it moved and the
//! destination can still take `needed` bytes, the point migrates into the
//! destination.

use super::{InsertPoint, Node};
use crate::common::format::ITEM_HEADER_SIZE as IH;
use crate::common::Result;

/// Which neighbour receives the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Parameters and results of one shift.
#[derive(Debug, Clone)]
pub struct ShiftHint {
    pub direction: Direction,
    /// Allow merging into the destination's boundary item and creating
    /// partial items.
    pub merge: bool,
    /// Insertion point in the source, rewritten to its final position.
    pub point: Option<InsertPoint>,
    /// Allow the point to migrate into the destination.
    pub move_point: bool,
    /// Bytes the insertion at `point` needs; the point only migrates into a
    /// destination with this much room left.
    pub needed: usize,

    /// Whole items moved.
    pub items: usize,
    /// Units moved by merges and partial items.
    pub units: usize,
    /// Bytes consumed in the destination.
    pub bytes: usize,
    /// Whether `point` now refers to the destination.
    pub point_moved: bool,
}

impl ShiftHint {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            merge: true,
            point: None,
            move_point: false,
            needed: 0,
            items: 0,
            units: 0,
            bytes: 0,
            point_moved: false,
        }
    }

    /// Track `point`, letting it migrate if `needed` bytes fit.
    pub fn with_point(mut self, point: InsertPoint, needed: usize) -> Self {
        self.point = Some(point);
        self.move_point = true;
        self.needed = needed;
        self
    }

    #[inline]
    pub fn moved_anything(&self) -> bool {
        self.items > 0 || self.units > 0
    }
}

/// Boundary of the movable part of the source.
///
/// For a left shift every unit strictly before `(item, unit)` may move; for
/// a right shift every unit at or after it. `gap` records whether the point
/// is a new-item gap rather than a paste into an existing item.
#[derive(Debug, Clone, Copy)]
struct Limit {
    item: usize,
    unit: usize,
    gap: bool,
}

impl Limit {
    fn new(point: Option<InsertPoint>, src: &Node, direction: Direction) -> Self {
        match point {
            None => Limit {
                item: match direction {
                    Direction::Left => src.items(),
                    Direction::Right => 0,
                },
                unit: 0,
                gap: true,
            },
            Some(InsertPoint::Gap { item }) => Limit {
                item,
                unit: 0,
                gap: true,
            },
            Some(InsertPoint::Paste { item, unit }) => Limit {
                item,
                unit,
                gap: false,
            },
        }
    }

    fn point(&self) -> InsertPoint {
        if self.gap {
            InsertPoint::Gap { item: self.item }
        } else {
            InsertPoint::Paste {
                item: self.item,
                unit: self.unit,
            }
        }
    }
}

impl Node {
    /// Move data from `self` into its neighbour `dst` as directed by `hint`.
    ///
    /// The caller updates delimiting keys and parent pointers afterwards.
    pub fn shift(&mut self, dst: &mut Node, hint: &mut ShiftHint) -> Result<()> {
        debug_assert_eq!(self.level(), dst.level());
        match hint.direction {
            Direction::Left => shift_left(self, dst, hint),
            Direction::Right => shift_right(self, dst, hint),
        }
    }
}

// ============================================================================
// Left shift: front of src → end of dst
// ============================================================================

/// Units of src's first item that may move left.
fn movable_front(src: &Node, limit: &Limit) -> usize {
    if src.is_empty() {
        0
    } else if limit.item > 0 {
        src.units(0)
    } else {
        limit.unit.min(src.units(0))
    }
}

/// Account for src's first item leaving whole.
fn front_item_left(limit: &mut Limit) {
    if limit.item > 0 {
        limit.item -= 1;
    } else {
        limit.unit = 0;
        limit.gap = true;
    }
}

fn shift_left(src: &mut Node, dst: &mut Node, hint: &mut ShiftHint) -> Result<()> {
    let mut limit = Limit::new(hint.point, src, Direction::Left);

    // Pass 1
    if hint.merge {
        merge_front(src, dst, hint, &mut limit)?;
    }

    // Pass 2
    while !src.is_empty() && movable_front(src, &limit) == src.units(0) {
        let item = src.item(0)?;
        if !dst.is_empty() && dst.item(dst.items() - 1)?.mergeable(&item) {
            break;
        }
        let len = src.item_length(0);
        if len + IH > dst.free_space() {
            break;
        }
        dst.insert_item(dst.items(), &item)?;
        src.remove_item(0);
        front_item_left(&mut limit);
        hint.items += 1;
        hint.bytes += len + IH;
    }

    // Pass 3
    if hint.merge && !merge_front(src, dst, hint, &mut limit)? {
        split_front(src, dst, hint, &mut limit)?;
    }

    if hint.point.is_some() {
        let at_edge = limit.item == 0 && limit.unit == 0;
        if at_edge && hint.move_point && dst.free_space() >= hint.needed {
            hint.point = Some(InsertPoint::Gap { item: dst.items() });
            hint.point_moved = true;
        } else {
            hint.point = Some(limit.point());
        }
    }
    Ok(())
}

/// Merge leading units of src's first item into dst's last item.
fn merge_front(
    src: &mut Node,
    dst: &mut Node,
    hint: &mut ShiftHint,
    limit: &mut Limit,
) -> Result<bool> {
    if src.is_empty() || dst.is_empty() {
        return Ok(false);
    }
    let mut first = src.item(0)?;
    let last_pos = dst.items() - 1;
    let mut last = dst.item(last_pos)?;
    if !last.mergeable(&first) {
        return Ok(false);
    }

    let (count, bytes) = first.prepare_shift(false, movable_front(src, limit), dst.free_space());
    if count == 0 {
        return Ok(false);
    }

    if count == first.units() {
        last.append(first)?;
        dst.replace_item(last_pos, &last)?;
        src.remove_item(0);
        front_item_left(limit);
    } else {
        let rest = first.split_off(count)?;
        last.append(first)?;
        dst.replace_item(last_pos, &last)?;
        src.replace_item(0, &rest)?;
        if limit.item == 0 {
            limit.unit -= count;
        }
    }
    hint.units += count;
    hint.bytes += bytes;
    Ok(true)
}

/// Move leading units of src's first item into a new item at dst's end.
fn split_front(src: &mut Node, dst: &mut Node, hint: &mut ShiftHint, limit: &mut Limit) -> Result<()> {
    if src.is_empty() {
        return Ok(());
    }
    let mut first = src.item(0)?;
    if !first.kind().has_units() {
        return Ok(());
    }
    let room = dst.free_space().saturating_sub(IH + first.overhead());
    let (count, bytes) = first.prepare_shift(false, movable_front(src, limit), room);
    if count == 0 || count == first.units() {
        return Ok(());
    }

    let rest = first.split_off(count)?;
    dst.insert_item(dst.items(), &first)?;
    src.replace_item(0, &rest)?;
    if limit.item == 0 {
        limit.unit -= count;
    }
    hint.units += count;
    hint.bytes += bytes + IH + first.overhead();
    Ok(())
}

// ============================================================================
// Right shift: end of src → front of dst
// ============================================================================

/// Units of src's last item that may move right.
fn movable_back(src: &Node, limit: &Limit) -> usize {
    let items = src.items();
    if items == 0 {
        return 0;
    }
    let last = items - 1;
    if limit.item < last {
        src.units(last)
    } else if limit.item == last {
        src.units(last).saturating_sub(limit.unit)
    } else {
        0
    }
}

/// Account for src's last item leaving whole.
fn back_item_left(src: &Node, limit: &mut Limit) {
    // `src` has already lost the item.
    if limit.item == src.items() {
        limit.unit = 0;
        limit.gap = true;
    }
}

fn shift_right(src: &mut Node, dst: &mut Node, hint: &mut ShiftHint) -> Result<()> {
    let mut limit = Limit::new(hint.point, src, Direction::Right);

    // Pass 1
    if hint.merge {
        merge_back(src, dst, hint, &mut limit)?;
    }

    // Pass 2
    while !src.is_empty() && movable_back(src, &limit) == src.units(src.items() - 1) {
        let last = src.items() - 1;
        let item = src.item(last)?;
        if !dst.is_empty() && item.mergeable(&dst.item(0)?) {
            break;
        }
        let len = src.item_length(last);
        if len + IH > dst.free_space() {
            break;
        }
        dst.insert_item(0, &item)?;
        src.remove_item(last);
        back_item_left(src, &mut limit);
        hint.items += 1;
        hint.bytes += len + IH;
    }

    // Pass 3
    if hint.merge && !merge_back(src, dst, hint, &mut limit)? {
        split_back(src, dst, hint, &limit)?;
    }

    if hint.point.is_some() {
        let items = src.items();
        let at_edge = limit.item >= items
            || (limit.item + 1 == items && limit.unit >= src.units(limit.item));
        if at_edge && hint.move_point && dst.free_space() >= hint.needed {
            hint.point = Some(InsertPoint::Gap { item: 0 });
            hint.point_moved = true;
        } else {
            hint.point = Some(limit.point());
        }
    }
    Ok(())
}

/// Merge trailing units of src's last item into dst's first item.
fn merge_back(
    src: &mut Node,
    dst: &mut Node,
    hint: &mut ShiftHint,
    limit: &mut Limit,
) -> Result<bool> {
    if src.is_empty() || dst.is_empty() {
        return Ok(false);
    }
    let last_pos = src.items() - 1;
    let mut last = src.item(last_pos)?;
    let mut first = dst.item(0)?;
    if !last.mergeable(&first) {
        return Ok(false);
    }

    let (count, bytes) = last.prepare_shift(true, movable_back(src, limit), dst.free_space());
    if count == 0 {
        return Ok(false);
    }

    if count == last.units() {
        first.insert_units(0, last)?;
        dst.replace_item(0, &first)?;
        src.remove_item(last_pos);
        back_item_left(src, limit);
    } else {
        let moved = last.split_off(last.units() - count)?;
        first.insert_units(0, moved)?;
        dst.replace_item(0, &first)?;
        src.replace_item(last_pos, &last)?;
    }
    hint.units += count;
    hint.bytes += bytes;
    Ok(true)
}

/// Move trailing units of src's last item into a new item at dst's front.
fn split_back(src: &mut Node, dst: &mut Node, hint: &mut ShiftHint, limit: &Limit) -> Result<()> {
    if src.is_empty() {
        return Ok(());
    }
    let last_pos = src.items() - 1;
    let mut last = src.item(last_pos)?;
    if !last.kind().has_units() {
        return Ok(());
    }
    let room = dst.free_space().saturating_sub(IH + last.overhead());
    let (count, bytes) = last.prepare_shift(true, movable_back(src, limit), room);
    if count == 0 || count == last.units() {
        return Ok(());
    }

    let moved = last.split_off(last.units() - count)?;
    dst.insert_item(0, &moved)?;
    src.replace_item(last_pos, &last)?;
    hint.units += count;
    hint.bytes += bytes + IH + moved.overhead();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BlockNr, Key, NodeFormat};
    use crate::item::{Item, ItemBody, StatData, Tail};
    use proptest::prelude::*;

    fn leaf(block: u64) -> Node {
        Node::new(BlockNr(block), 512, 1, NodeFormat::Plain, 0)
    }

    fn sd(oid: u64) -> Item {
        Item::stat_data(Key::stat_data(1, oid), StatData::default())
    }

    fn tail(oid: u64, offset: u64, bytes: &[u8]) -> Item {
        Item::tail(Key::file_body(1, oid, offset), bytes.to_vec())
    }

    fn fill(node: &mut Node, items: &[Item]) {
        for item in items {
            node.insert_item(node.items(), item).unwrap();
        }
    }

    /// Tail bytes per object, concatenated across item and node borders.
    fn streams(nodes: &[&Node]) -> Vec<(u64, Vec<u8>)> {
        let mut out: Vec<(u64, Vec<u8>)> = Vec::new();
        for node in nodes {
            for pos in 0..node.items() {
                let item = node.item(pos).unwrap();
                if let ItemBody::Tail(Tail(bytes)) = item.body {
                    match out.last_mut() {
                        Some((oid, data)) if *oid == item.key.objectid() => data.extend(bytes),
                        _ => out.push((item.key.objectid(), bytes)),
                    }
                }
            }
        }
        out
    }

    #[test]
    fn test_left_shift_moves_whole_items() {
        let mut src = leaf(1);
        let mut dst = leaf(2);
        fill(&mut src, &[sd(1), sd(2), sd(3)]);

        let mut hint = ShiftHint::new(Direction::Left);
        src.shift(&mut dst, &mut hint).unwrap();

        assert_eq!(hint.items, 3);
        assert_eq!(hint.units, 0);
        assert!(src.is_empty());
        assert_eq!(dst.items(), 3);
        assert_eq!(dst.key_at(2), Key::stat_data(1, 3));
    }

    #[test]
    fn test_left_shift_merges_boundary_items() {
        let mut dst = leaf(1);
        let mut src = leaf(2);
        fill(&mut dst, &[tail(1, 0, b"abc")]);
        fill(&mut src, &[tail(1, 3, b"defgh"), tail(2, 0, b"xy")]);

        let mut hint = ShiftHint::new(Direction::Left);
        src.shift(&mut dst, &mut hint).unwrap();

        assert!(src.is_empty());
        assert_eq!(dst.items(), 2);
        assert_eq!(dst.item(0).unwrap(), tail(1, 0, b"abcdefgh"));
        assert_eq!(hint.units, 5);
        assert_eq!(hint.items, 1);
        assert!(dst.check().is_ok());
    }

    #[test]
    fn test_left_shift_splits_item_that_does_not_fit() {
        let mut dst = leaf(1);
        let mut src = leaf(2);
        fill(&mut dst, &[tail(1, 0, &[b'x'; 300])]);
        fill(&mut src, &[tail(2, 0, &[b'y'; 400])]);
        let room = dst.free_space();

        let mut hint = ShiftHint::new(Direction::Left);
        src.shift(&mut dst, &mut hint).unwrap();

        let moved = room - IH;
        assert_eq!(hint.units, moved);
        assert_eq!(hint.bytes, room);
        assert_eq!(dst.free_space(), 0);
        assert_eq!(src.key_at(0), Key::file_body(1, 2, moved as u64));
        assert_eq!(src.units(0), 400 - moved);
        assert!(src.check().is_ok() && dst.check().is_ok());
    }

    #[test]
    fn test_shift_without_merge_keeps_boundary_item() {
        let mut dst = leaf(1);
        let mut src = leaf(2);
        fill(&mut dst, &[tail(1, 0, b"abc")]);
        fill(&mut src, &[tail(1, 3, b"def")]);

        let mut hint = ShiftHint::new(Direction::Left);
        hint.merge = false;
        src.shift(&mut dst, &mut hint).unwrap();

        assert!(!hint.moved_anything());
        assert_eq!(src.items(), 1);
    }

    #[test]
    fn test_right_shift_prepends_into_first_item() {
        let mut src = leaf(1);
        let mut dst = leaf(2);
        fill(&mut src, &[sd(1), tail(1, 0, b"abc")]);
        fill(&mut dst, &[tail(1, 3, b"def")]);

        let mut hint = ShiftHint::new(Direction::Right);
        src.shift(&mut dst, &mut hint).unwrap();

        assert!(src.is_empty());
        assert_eq!(dst.items(), 2);
        assert_eq!(dst.key_at(0), Key::stat_data(1, 1));
        assert_eq!(dst.item(1).unwrap(), tail(1, 0, b"abcdef"));
    }

    #[test]
    fn test_point_at_end_migrates_right() {
        let mut src = leaf(1);
        let mut dst = leaf(2);
        fill(&mut src, &[sd(1), sd(2), sd(3)]);

        let mut hint = ShiftHint::new(Direction::Right)
            .with_point(InsertPoint::Gap { item: 3 }, StatData::SIZE + IH);
        src.shift(&mut dst, &mut hint).unwrap();

        assert!(!hint.moved_anything());
        assert!(hint.point_moved);
        assert_eq!(hint.point, Some(InsertPoint::Gap { item: 0 }));
    }

    #[test]
    fn test_point_moves_with_items_right() {
        let mut src = leaf(1);
        let mut dst = leaf(2);
        fill(&mut src, &[sd(1), sd(3), sd(5)]);

        let mut hint = ShiftHint::new(Direction::Right)
            .with_point(InsertPoint::Gap { item: 1 }, StatData::SIZE + IH);
        src.shift(&mut dst, &mut hint).unwrap();

        assert_eq!(hint.items, 2);
        assert!(hint.point_moved);
        assert_eq!(hint.point, Some(InsertPoint::Gap { item: 0 }));
        assert_eq!(src.items(), 1);
        assert_eq!(dst.key_at(0), Key::stat_data(1, 3));
    }

    #[test]
    fn test_point_stays_when_not_allowed_to_move() {
        let mut src = leaf(1);
        let mut dst = leaf(2);
        fill(&mut src, &[sd(1), sd(3), sd(5)]);

        let mut hint = ShiftHint::new(Direction::Right)
            .with_point(InsertPoint::Gap { item: 1 }, StatData::SIZE + IH);
        hint.move_point = false;
        src.shift(&mut dst, &mut hint).unwrap();

        assert!(!hint.point_moved);
        assert_eq!(hint.point, Some(InsertPoint::Gap { item: 1 }));
        assert_eq!(src.items(), 1);
    }

    #[test]
    fn test_left_shift_stops_at_paste_point() {
        let mut src = leaf(1);
        let mut dst = leaf(2);
        fill(&mut src, &[tail(1, 0, b"abcdef")]);

        let mut hint =
            ShiftHint::new(Direction::Left).with_point(InsertPoint::Paste { item: 0, unit: 4 }, 1);
        hint.move_point = false;
        src.shift(&mut dst, &mut hint).unwrap();

        assert_eq!(dst.item(0).unwrap(), tail(1, 0, b"abcd"));
        assert_eq!(src.item(0).unwrap(), tail(1, 4, b"ef"));
        assert_eq!(hint.point, Some(InsertPoint::Paste { item: 0, unit: 0 }));
    }

    proptest! {
        #[test]
        fn prop_shift_conserves_data(
            lens in proptest::collection::vec(1usize..60, 2..6),
            split in 1usize..5,
            left in any::<bool>(),
        ) {
            let split = split.min(lens.len() - 1);
            let items: Vec<Item> = lens
                .iter()
                .enumerate()
                .map(|(i, len)| tail(i as u64 + 1, 0, &vec![i as u8; *len]))
                .collect();
            let mut a = leaf(1);
            let mut b = leaf(2);
            fill(&mut a, &items[..split]);
            fill(&mut b, &items[split..]);
            let before = streams(&[&a, &b]);

            if left {
                b.shift(&mut a, &mut ShiftHint::new(Direction::Left)).unwrap();
            } else {
                a.shift(&mut b, &mut ShiftHint::new(Direction::Right)).unwrap();
            }

            prop_assert_eq!(streams(&[&a, &b]), before);
            prop_assert!(a.check().is_ok());
            prop_assert!(b.check().is_ok());
        }
    }
}
