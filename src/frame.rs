use crate::types::Cell;
use std::collections::{BTreeMap, HashMap, btree_map, hash_map};
use std::fmt;

/// One scope level: a key-unique mapping from names to values.
///
/// The environment only needs insert-if-absent, lookup, removal and
/// iteration, so any associative container can back it. A miss is an
/// ordinary `None`/`false`/`0`, never an error.
pub trait Frame: Default + fmt::Debug {
    type Iter<'a>: Iterator<Item = (&'a String, &'a Cell)>
    where
        Self: 'a;

    /// Inserts `value` under `name` unless the name is already present.
    /// Returns whether the insert happened; an existing binding is left untouched.
    fn insert(&mut self, name: String, value: Cell) -> bool;

    fn find(&self, name: &str) -> Option<&Cell>;

    /// Removes `name`, returning how many bindings were removed (0 or 1).
    fn erase(&mut self, name: &str) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Self::Iter<'_>;
}

/// Hash-table backed frame, the default.
pub type HashFrame = HashMap<String, Cell>;

/// Balanced-tree backed frame; iterates in name order.
pub type OrderedFrame = BTreeMap<String, Cell>;

impl Frame for HashMap<String, Cell> {
    type Iter<'a> = hash_map::Iter<'a, String, Cell>;

    fn insert(&mut self, name: String, value: Cell) -> bool {
        match self.entry(name) {
            hash_map::Entry::Occupied(_) => false,
            hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    fn find(&self, name: &str) -> Option<&Cell> {
        self.get(name)
    }

    fn erase(&mut self, name: &str) -> usize {
        self.remove(name).map_or(0, |_| 1)
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn iter(&self) -> Self::Iter<'_> {
        HashMap::iter(self)
    }
}

impl Frame for BTreeMap<String, Cell> {
    type Iter<'a> = btree_map::Iter<'a, String, Cell>;

    fn insert(&mut self, name: String, value: Cell) -> bool {
        match self.entry(name) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    fn find(&self, name: &str) -> Option<&Cell> {
        self.get(name)
    }

    fn erase(&mut self, name: &str) -> usize {
        self.remove(name).map_or(0, |_| 1)
    }

    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn iter(&self) -> Self::Iter<'_> {
        BTreeMap::iter(self)
    }
}
