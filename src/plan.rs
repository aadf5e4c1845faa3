//! Compilation of field specs into the immutable sort and grouping plan used
//! by every fold of a table.

use crate::{
    error::{Error, Result},
    field::{FieldSpec, SortDirection},
    item::Item,
};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledSort {
    pub field_index: usize,
    pub order: u32,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    field_count: usize,
    max_group_depth: Option<usize>,
    max_depth: Option<usize>,
    sorts: Vec<CompiledSort>,
}

impl FieldPlan {
    /// Compiles `fields` in a single pass.
    ///
    /// With `show_detail` the plan reserves one extra depth beneath the
    /// deepest group for ungrouped detail rows.
    pub fn compile(fields: &[FieldSpec], show_detail: bool) -> Result<Self> {
        let mut depths = Vec::with_capacity(fields.len());
        let mut max_group_depth: Option<usize> = None;
        let mut sorts: Vec<CompiledSort> = Vec::new();

        for (index, field) in fields.iter().enumerate() {
            depths.push(field.group);
            if let Some(depth) = field.group {
                max_group_depth = Some(max_group_depth.map_or(depth, |max| max.max(depth)));
            }

            if let Some(sort) = field.sort {
                // Insert after every sort of equal order so ties keep field order.
                let at = sorts.partition_point(|s| s.order <= sort.order);
                sorts.insert(
                    at,
                    CompiledSort {
                        field_index: index,
                        order: sort.order,
                        direction: sort.direction,
                    },
                );
            }
        }

        if let Some(max) = max_group_depth {
            for depth in 0..max {
                if !depths.contains(&Some(depth)) {
                    return Err(Error::InvalidConfig(format!(
                        "fields group at depth {} but no field groups at depth {}",
                        max, depth
                    )));
                }
            }
        }

        let max_depth = match (max_group_depth, show_detail) {
            (Some(max), true) => Some(max + 1),
            (None, true) => Some(0),
            (max, false) => max,
        };

        Ok(Self {
            field_count: fields.len(),
            max_group_depth,
            max_depth,
            sorts,
        })
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn max_group_depth(&self) -> Option<usize> {
        self.max_group_depth
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn has_group_by(&self) -> bool {
        self.max_group_depth.is_some()
    }

    pub fn has_sort(&self) -> bool {
        !self.sorts.is_empty()
    }

    pub fn sorts(&self) -> &[CompiledSort] {
        &self.sorts
    }

    /// Orders two rows by the compiled sorts.
    ///
    /// A missing generator is least in either direction; the direction only
    /// flips the comparison of two present values.
    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        for sort in &self.sorts {
            let ordering = match (a.generator(sort.field_index), b.generator(sort.field_index)) {
                (Some(x), Some(y)) => match sort.direction {
                    SortDirection::Ascending => x.compare(y),
                    SortDirection::Descending => y.compare(x),
                },
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        item::{Key, RowKey},
        value::{Generator, Val},
    };

    fn row(values: Vec<Option<i64>>) -> Item {
        let generators: Vec<Option<Generator>> = values
            .into_iter()
            .map(|v| v.map(|n| Generator::Value(Val::Long(n))))
            .collect();
        Item::new(RowKey::detail(Key::root()), generators)
    }

    #[test]
    fn test_empty_fields_compile_to_empty_plan() {
        let plan = FieldPlan::compile(&[], false).unwrap();
        assert_eq!(plan.field_count(), 0);
        assert_eq!(plan.max_group_depth(), None);
        assert_eq!(plan.max_depth(), None);
        assert!(!plan.has_group_by());
        assert!(!plan.has_sort());
    }

    #[test]
    fn test_group_depths() {
        let fields = vec![
            FieldSpec::new("a").group(0),
            FieldSpec::new("b").group(1),
            FieldSpec::new("c"),
            FieldSpec::new("d").group(1),
        ];

        let plan = FieldPlan::compile(&fields, false).unwrap();
        assert_eq!(plan.field_count(), 4);
        assert_eq!(plan.max_group_depth(), Some(1));
        assert_eq!(plan.max_depth(), Some(1));
        assert!(plan.has_group_by());

        let detailed = FieldPlan::compile(&fields, true).unwrap();
        assert_eq!(detailed.max_depth(), Some(2));
    }

    #[test]
    fn test_detail_only_plan() {
        let plan = FieldPlan::compile(&[FieldSpec::new("a")], true).unwrap();
        assert_eq!(plan.max_group_depth(), None);
        assert_eq!(plan.max_depth(), Some(0));
    }

    #[test]
    fn test_group_depth_gap_is_rejected() {
        let fields = vec![FieldSpec::new("a").group(0), FieldSpec::new("b").group(2)];
        let err = FieldPlan::compile(&fields, false).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_sorts_are_ordered_and_stable() {
        let fields = vec![
            FieldSpec::new("a").sort(2, SortDirection::Ascending),
            FieldSpec::new("b").sort(0, SortDirection::Descending),
            FieldSpec::new("c").group(0),
            FieldSpec::new("d").sort(2, SortDirection::Descending),
            FieldSpec::new("e").sort(1, SortDirection::Ascending),
        ];

        let plan = FieldPlan::compile(&fields, false).unwrap();
        let order: Vec<usize> = plan.sorts().iter().map(|s| s.field_index).collect();
        assert_eq!(order, vec![1, 4, 0, 3]);
    }

    #[test]
    fn test_compare_uses_later_sorts_on_ties() {
        let fields = vec![
            FieldSpec::new("a").sort(0, SortDirection::Ascending),
            FieldSpec::new("b").sort(1, SortDirection::Descending),
        ];
        let plan = FieldPlan::compile(&fields, false).unwrap();

        let x = row(vec![Some(1), Some(5)]);
        let y = row(vec![Some(1), Some(7)]);
        let z = row(vec![Some(0), Some(9)]);

        assert_eq!(plan.compare(&x, &y), Ordering::Greater);
        assert_eq!(plan.compare(&z, &x), Ordering::Less);
        assert_eq!(plan.compare(&x, &x.clone()), Ordering::Equal);
    }

    #[test]
    fn test_null_sorts_least_in_both_directions() {
        let present = row(vec![Some(3)]);
        let missing = row(vec![None]);

        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let plan = FieldPlan::compile(&[FieldSpec::new("a").sort(0, direction)], false).unwrap();
            assert_eq!(plan.compare(&missing, &present), Ordering::Less);
            assert_eq!(plan.compare(&present, &missing), Ordering::Greater);
            assert_eq!(plan.compare(&missing, &missing.clone()), Ordering::Equal);
        }
    }

    #[test]
    fn test_no_sorts_compare_equal() {
        let plan = FieldPlan::compile(&[FieldSpec::new("a").group(0)], false).unwrap();
        assert_eq!(plan.compare(&row(vec![Some(1)]), &row(vec![Some(2)])), Ordering::Equal);
    }
}
