use super::Data;
use crate::{
    config::StoreSize,
    error::{Error, Result},
    item::{Item, Key, RowKey},
    plan::FieldPlan,
    queue::UnsafePairQueue,
};
use std::collections::HashMap;

/// Builds a [`Data`] snapshot from reduced rows.
///
/// Rows are grouped under their parent key, each child list is sorted with
/// the plan's comparator and then trimmed to the store size of its depth.
pub struct ResultStoreCreator<'a> {
    plan: &'a FieldPlan,
    child_map: HashMap<Key, Vec<Item>>,
    sorted: bool,
}

impl<'a> ResultStoreCreator<'a> {
    pub fn new(plan: &'a FieldPlan) -> Self {
        Self {
            plan,
            child_map: HashMap::new(),
            sorted: true,
        }
    }

    pub fn read<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (RowKey, Item)>,
    {
        for (_, item) in pairs {
            if item.generators.len() != self.plan.field_count() {
                return Err(Error::InvalidData(format!(
                    "row has {} values but the table has {} fields",
                    item.generators.len(),
                    self.plan.field_count()
                )));
            }
            self.child_map
                .entry(item.key.parent())
                .or_default()
                .push(item);
        }
        self.sorted = false;
        Ok(())
    }

    fn sort(&mut self) {
        if self.sorted {
            return;
        }
        if self.plan.has_sort() {
            let plan = self.plan;
            for children in self.child_map.values_mut() {
                // Stable, so equal rows keep arrival order.
                children.sort_by(|a, b| plan.compare(a, b));
            }
        }
        self.sorted = true;
    }

    /// Sorts, then keeps at most `store_size.size(depth)` children under
    /// each parent, shallowest depth first.
    ///
    /// Only rows reachable from the root through retained groups survive, so
    /// everything beneath a trimmed group is dropped with it.
    pub fn trim(&mut self, store_size: &StoreSize) {
        self.sort();

        let mut source = std::mem::take(&mut self.child_map);
        let mut trimmed = HashMap::with_capacity(source.len());
        let mut parents = vec![Key::root()];

        while let Some(parent) = parents.pop() {
            let Some(mut children) = source.remove(&parent) else {
                continue;
            };
            children.truncate(store_size.size(parent.len()));
            parents.extend(children.iter().filter_map(|child| child.key.key().cloned()));
            trimmed.insert(parent, children);
        }

        let orphaned: usize = source.values().map(Vec::len).sum();
        if orphaned > 0 {
            tracing::trace!(rows = orphaned, "Dropped rows beneath trimmed groups");
        }

        self.child_map = trimmed;
    }

    pub fn size(&self) -> u64 {
        self.child_map.values().map(|children| children.len() as u64).sum()
    }

    /// Copies the retained rows into a queue for the next merge.
    pub fn remaining(&self) -> UnsafePairQueue<RowKey, Item> {
        let mut queue = UnsafePairQueue::with_capacity(self.size() as usize);
        for item in self.child_map.values().flatten() {
            queue.collect(item.key.clone(), item.clone());
        }
        queue
    }

    pub fn create(mut self, total_size: u64) -> Data {
        self.sort();
        let size = self.size();
        Data::new(self.child_map, size, total_size)
    }
}
