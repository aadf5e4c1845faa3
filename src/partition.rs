//! Partition and reduce of rows before they are sorted into a result store.
//!
//! Grouped rows are partitioned by depth and key; rows that land in the same
//! partition are reduced into one by combining their generators field by
//! field. Detail rows skip partitioning entirely and go straight to the
//! output, so two detail rows are never merged even when all their values
//! agree.

use crate::{
    error::{Error, Result},
    item::{Item, Key, RowKey},
    plan::FieldPlan,
    queue::OutputCollector,
};
use std::collections::HashMap;

#[derive(Default)]
struct Partition {
    slots: HashMap<Key, usize>,
    items: Vec<Item>,
}

pub struct ItemPartitioner<'a, O> {
    plan: &'a FieldPlan,
    output: O,
    partitions: Vec<Partition>,
    passed_through: usize,
}

impl<'a, O> ItemPartitioner<'a, O>
where
    O: OutputCollector<RowKey, Item>,
{
    pub fn new(plan: &'a FieldPlan, output: O) -> Self {
        let depths = plan.max_group_depth().map_or(0, |max| max + 1);
        let mut partitions = Vec::with_capacity(depths);
        partitions.resize_with(depths, Partition::default);

        Self {
            plan,
            output,
            partitions,
            passed_through: 0,
        }
    }

    /// Reads every pair from `pairs`, reducing grouped rows into their partition.
    pub fn read<I>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (RowKey, Item)>,
    {
        for (key, item) in pairs {
            self.collect(key, item)?;
        }
        Ok(())
    }

    fn collect(&mut self, key: RowKey, mut item: Item) -> Result<()> {
        if item.generators.len() != self.plan.field_count() {
            return Err(Error::InvalidData(format!(
                "row has {} values but the table has {} fields",
                item.generators.len(),
                self.plan.field_count()
            )));
        }

        let group = match key {
            RowKey::Group(group) if !group.is_root() => group,
            RowKey::Group(_) => {
                // No group values: a top-level detail row.
                let key = RowKey::detail(Key::root());
                item.key = key.clone();
                self.pass_through(key, item);
                return Ok(());
            }
            RowKey::Detail { .. } => {
                self.pass_through(key, item);
                return Ok(());
            }
        };

        let depth = group.len().saturating_sub(1);
        let partition = self.partitions.get_mut(depth).ok_or_else(|| {
            Error::InvalidData(format!(
                "row {} is grouped deeper than the table's group depth",
                group
            ))
        })?;

        match partition.slots.get(&group) {
            Some(&slot) => reduce(&mut partition.items[slot], item),
            None => {
                partition.slots.insert(group, partition.items.len());
                partition.items.push(item);
                Ok(())
            }
        }
    }

    fn pass_through(&mut self, key: RowKey, item: Item) {
        self.passed_through += 1;
        self.output.collect(key, item);
    }

    /// Emits the reduced rows, shallowest depth first, and returns the output.
    pub fn partition(mut self) -> O {
        let mut reduced = 0;
        for partition in self.partitions.drain(..) {
            for item in partition.items {
                reduced += 1;
                self.output.collect(item.key.clone(), item);
            }
        }

        tracing::trace!(
            details = self.passed_through,
            groups = reduced,
            "Partitioned rows"
        );
        self.output
    }
}

/// Combines `added` into `existing`, field by field.
fn reduce(existing: &mut Item, added: Item) -> Result<()> {
    let incoming = added.generators.into_vec();
    for (field, (current, incoming)) in existing.generators.iter_mut().zip(incoming).enumerate() {
        let Some(incoming) = incoming else {
            continue;
        };
        match current {
            Some(current) => current
                .combine(incoming)
                .map_err(|_| Error::IncompatibleGenerators(field))?,
            None => *current = Some(incoming),
        }
    }
    Ok(())
}
