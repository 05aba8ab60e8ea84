//! Tail items: file bytes stored directly in the leaf, one unit per byte.

use super::{ItemKind, ItemOps, UnitLookup, UnitOps};
use crate::common::{Error, Key, Result};

/// Raw file bytes. Unit `i` has key offset `key.offset() + i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tail(pub Vec<u8>);

/// Whether two keys address the same byte stream.
pub(super) fn same_stream(a: &Key, b: &Key) -> bool {
    let (a, b) = (a.words(), b.words());
    a[0] == b[0] && a[1] == b[1]
}

impl ItemOps for Tail {
    const KIND: ItemKind = ItemKind::Tail;

    fn decode(_key: &Key, data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::invalid("empty tail item"));
        }
        Ok(Tail(data.to_vec()))
    }

    fn encoded_len(&self) -> usize {
        self.0.len()
    }

    fn encode(&self, out: &mut [u8]) {
        out[..self.0.len()].copy_from_slice(&self.0);
    }

    fn units(&self) -> usize {
        self.0.len()
    }

    fn unit_key(&self, key: &Key, unit: usize) -> Key {
        key.with_offset(key.offset() + unit as u64)
    }

    fn maxreal_key(&self, key: &Key) -> Key {
        key.with_offset(key.offset() + (self.0.len() as u64).saturating_sub(1))
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
        let delta = target.offset() - key.offset();
        if delta < self.0.len() as u64 {
            UnitLookup::Found(delta as usize)
        } else {
            UnitLookup::After
        }
    }

    fn mergeable(&self, key: &Key, next_key: &Key, _next: &Self) -> bool {
        same_stream(key, next_key)
            && key.offset().checked_add(self.0.len() as u64) == Some(next_key.offset())
    }

    fn overwrite(&mut self, at: usize, units: &Self) -> Result<()> {
        let end = at + units.0.len();
        if end > self.0.len() {
            return Err(Error::invalid(format!(
                "write of bytes {}..{} past the end of a {}-byte tail",
                at,
                end,
                self.0.len()
            )));
        }
        self.0[at..end].copy_from_slice(&units.0);
        Ok(())
    }
}

impl UnitOps for Tail {
    fn unit_size(&self, _unit: usize) -> usize {
        1
    }

    fn split_off(&mut self, at: usize) -> Self {
        Tail(self.0.split_off(at))
    }

    fn insert_units(&mut self, at: usize, units: Self) {
        self.0.splice(at..at, units.0);
    }

    fn remove_units(&mut self, from: usize, count: usize) {
        self.0.drain(from..from + count);
    }
}
