use crate::item::{Item, Key};
use std::collections::HashMap;

/// Immutable snapshot of a table's merged rows.
///
/// Children are held per parent key, already sorted and trimmed. `size` is
/// the number of rows retained; `total_size` counts every row that has been
/// merged into the table, including those since trimmed away.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data {
    child_map: HashMap<Key, Vec<Item>>,
    size: u64,
    total_size: u64,
}

impl Data {
    pub fn new(child_map: HashMap<Key, Vec<Item>>, size: u64, total_size: u64) -> Self {
        Self {
            child_map,
            size,
            total_size,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Children of `parent` in sorted order.
    pub fn children(&self, parent: &Key) -> &[Item] {
        self.child_map.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Top-level rows in sorted order.
    pub fn root_items(&self) -> &[Item] {
        self.children(&Key::root())
    }

    pub fn child_map(&self) -> &HashMap<Key, Vec<Item>> {
        &self.child_map
    }

    /// Every retained row, grouped by parent.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.child_map.values().flatten()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}
