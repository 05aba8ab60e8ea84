//! Descent by key and movement between leaves.

use super::Tree;
use crate::common::format::LEAF_LEVEL;
use crate::common::{Error, Key, Result};
use crate::coord::{Between, Coord};
use crate::item::{DirEntry, Item, ItemBody};
use crate::node::{Bias, Direction, Lookup};

impl Tree {
    /// Descend from the root to `level` looking for `key`.
    ///
    /// Internal levels are searched with [`Bias::Nearest`] so the descent
    /// follows the pointer whose delimiting key is the greatest one not above
    /// `key`. On the target level the lookup uses `bias`. An empty tree
    /// yields `Lookup::Absent` and an invalid coordinate.
    pub fn coord_by_key(&mut self, key: &Key, level: u8, bias: Bias) -> Result<(Lookup, Coord)> {
        let Some(mut id) = self.root else {
            return Ok((Lookup::Absent, Coord::invalid()));
        };
        loop {
            let node = self.node(id)?;
            let mut coord = Coord::new(id);
            if node.level() <= level || node.is_leaf() {
                let found = node.lookup(key, bias, &mut coord)?;
                return Ok((found, coord));
            }
            if node.is_empty() {
                return Err(Error::corrupted(node.block().0, "empty internal node"));
            }
            node.lookup(key, Bias::Nearest, &mut coord)?;
            let pos = match coord.between {
                Between::BeforeItem | Between::EmptyNode => 0,
                _ => coord.item,
            };
            id = self.load_child(id, pos)?;
        }
    }

    /// Leaf-level lookup.
    pub fn lookup(&mut self, key: &Key, bias: Bias) -> Result<(Lookup, Coord)> {
        self.maybe_evict(None)?;
        self.coord_by_key(key, LEAF_LEVEL, bias)
    }

    /// The unit stored under `key`, if any.
    pub fn get(&mut self, key: &Key) -> Result<Option<Item>> {
        match self.lookup(key, Bias::Exact)? {
            (Lookup::Present, coord) => Ok(Some(self.fetch_unit(&coord)?)),
            (Lookup::Absent, _) => Ok(None),
        }
    }

    /// The whole item `coord` points into.
    pub fn fetch(&self, coord: &Coord) -> Result<Item> {
        let node = self.node(coord.node)?;
        if !coord.is_existing_item(node) {
            return Err(Error::invalid("coordinate does not address an item"));
        }
        node.item(coord.item)
    }

    /// The unit `coord` points at, as a single-unit item.
    pub fn fetch_unit(&self, coord: &Coord) -> Result<Item> {
        let node = self.node(coord.node)?;
        if !coord.is_existing_unit(node) {
            return Err(Error::invalid("coordinate does not address a unit"));
        }
        node.item(coord.item)?.unit(coord.unit)
    }

    /// Coordinate of the first unit in the tree.
    pub fn first(&mut self) -> Result<Option<Coord>> {
        let (_, mut coord) = self.lookup(&Key::minimal(), Bias::Nearest)?;
        if coord.between == Between::Invalid {
            return Ok(None);
        }
        let node = self.node(coord.node)?;
        if coord.set_to_right(node) || coord.is_existing_unit(node) {
            return Ok(Some(coord));
        }
        Ok(self.step_right(&mut coord)?.then_some(coord))
    }

    /// Move `coord` to the next unit, crossing into right neighbours.
    ///
    /// Returns `false` and leaves `coord` untouched at the end of the tree.
    pub fn step_right(&mut self, coord: &mut Coord) -> Result<bool> {
        let mut next = *coord;
        if next.next_unit(self.node(coord.node)?) {
            *coord = next;
            return Ok(true);
        }
        let mut current = coord.node;
        while let Some(right) = self.neighbor(current, Direction::Right)? {
            let node = self.node(right)?;
            if !node.is_empty() {
                let mut first = Coord::new(right);
                first.init_first_unit(node);
                *coord = first;
                return Ok(true);
            }
            current = right;
        }
        Ok(false)
    }

    /// Move `coord` to the previous unit, crossing into left neighbours.
    pub fn step_left(&mut self, coord: &mut Coord) -> Result<bool> {
        let mut prev = *coord;
        if prev.prev_unit(self.node(coord.node)?) {
            *coord = prev;
            return Ok(true);
        }
        let mut current = coord.node;
        while let Some(left) = self.neighbor(current, Direction::Left)? {
            let node = self.node(left)?;
            if !node.is_empty() {
                let mut last = Coord::new(left);
                last.init_last_unit(node);
                *coord = last;
                return Ok(true);
            }
            current = left;
        }
        Ok(false)
    }

    /// Find the unit in the collision run of `key` that `accept` approves.
    ///
    /// A collision run is the set of units whose keys equal `key` in every
    /// field but the generation byte. Units are offered to `accept` in key
    /// order, and the run may span several leaves.
    pub fn lookup_collision<F>(&mut self, key: &Key, mut accept: F) -> Result<Option<Coord>>
    where
        F: FnMut(&Item) -> bool,
    {
        let mut start = *key;
        start.set_hash(key.hash(), 0);

        let (found, mut coord) = self.lookup(&start, Bias::Nearest)?;
        match coord.between {
            Between::Invalid | Between::EmptyNode => return Ok(None),
            Between::BeforeItem => {
                if !coord.set_to_right(self.node(coord.node)?) {
                    return Ok(None);
                }
            }
            _ => {
                if found == Lookup::Absent && !self.step_right(&mut coord)? {
                    return Ok(None);
                }
            }
        }

        loop {
            let unit = self.fetch_unit(&coord)?;
            if !unit.key.short_eq(key) {
                return Ok(None);
            }
            if accept(&unit) {
                return Ok(Some(coord));
            }
            if !self.step_right(&mut coord)? {
                return Ok(None);
            }
        }
    }

    /// Look up entry `name` of directory `dir`.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` for a name no entry can carry.
    pub fn find_entry(&mut self, dir: u64, name: &[u8]) -> Result<Option<(Coord, DirEntry)>> {
        let key = DirEntry::entry_key(dir, name, 0)?;
        let mut hit = None;
        let coord = self.lookup_collision(&key, |unit| match &unit.body {
            ItemBody::DirEntry(entries) => match entries.0.first() {
                Some(entry) if entry.has_name(name) => {
                    hit = Some(entry.clone());
                    true
                }
                _ => false,
            },
            _ => false,
        })?;
        Ok(coord.zip(hit))
    }
}

#[cfg(test)]
mod tests {
    use crate::common::Key;
    use crate::item::{Item, StatData};
    use crate::node::{Bias, Lookup};
    use crate::tree::tests::small_tree;

    #[test]
    fn test_lookup_in_empty_tree() {
        let mut tree = small_tree();
        let (found, _) = tree.lookup(&Key::stat_data(1, 1), Bias::Exact).unwrap();
        assert_eq!(found, Lookup::Absent);
        assert!(tree.get(&Key::stat_data(1, 1)).unwrap().is_none());
        assert!(tree.first().unwrap().is_none());
    }

    #[test]
    fn test_get_after_many_inserts() {
        let mut tree = small_tree();
        for oid in 0..200u64 {
            tree.insert(&Item::stat_data(Key::stat_data(7, oid), StatData::default()))
                .unwrap();
        }
        assert!(tree.height() >= 2);
        for oid in 0..200u64 {
            let item = tree.get(&Key::stat_data(7, oid)).unwrap().unwrap();
            assert_eq!(item.key, Key::stat_data(7, oid));
        }
        assert!(tree.get(&Key::stat_data(7, 200)).unwrap().is_none());
    }

    #[test]
    fn test_step_right_visits_every_unit_in_order() {
        let mut tree = small_tree();
        for oid in (0..120u64).rev() {
            tree.insert(&Item::stat_data(Key::stat_data(3, oid), StatData::default()))
                .unwrap();
        }
        let mut coord = tree.first().unwrap().unwrap();
        let mut seen = vec![tree.fetch_unit(&coord).unwrap().key.objectid()];
        while tree.step_right(&mut coord).unwrap() {
            seen.push(tree.fetch_unit(&coord).unwrap().key.objectid());
        }
        assert_eq!(seen, (0..120).collect::<Vec<_>>());

        let mut back = 0;
        while tree.step_left(&mut coord).unwrap() {
            back += 1;
        }
        assert_eq!(back, 119);
        assert_eq!(tree.fetch_unit(&coord).unwrap().key.objectid(), 0);
    }

    #[test]
    fn test_find_entry_in_collision_run() {
        let mut tree = small_tree();
        tree.add_entry(10, b"a-very-long-name", 10, 20).unwrap();
        tree.add_entry(10, b"short", 10, 21).unwrap();

        let (_, entry) = tree.find_entry(10, b"a-very-long-name").unwrap().unwrap();
        assert_eq!(entry.target_objectid, 20);
        let (_, entry) = tree.find_entry(10, b"short").unwrap().unwrap();
        assert_eq!(entry.target_objectid, 21);
        assert!(tree.find_entry(10, b"missing").unwrap().is_none());
        assert!(tree.find_entry(11, b"short").unwrap().is_none());
    }

    #[test]
    fn test_find_every_entry_of_one_item() {
        let mut tree = small_tree();
        let names: [&[u8]; 3] = [b"aa", b"bb", b"cc"];
        for (i, name) in names.iter().enumerate() {
            tree.add_entry(3, name, 3, 40 + i as u64).unwrap();
        }
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).unwrap().items(), 1);

        for (i, name) in names.iter().enumerate() {
            let (coord, entry) = tree.find_entry(3, name).unwrap().unwrap();
            assert_eq!(entry.target_objectid, 40 + i as u64);
            assert_eq!(tree.fetch_unit(&coord).unwrap().units(), 1);
        }
    }
}
