use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sorting applied to a field. Where several fields are sorted, `order`
/// decides precedence with 0 sorting first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub order: u32,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(order: u32, direction: SortDirection) -> Self {
        Self { order, direction }
    }
}

/// A table column as requested by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub sort: Option<Sort>,
    /// Depth this field groups at, 0 being the outermost group.
    #[serde(default)]
    pub group: Option<usize>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: None,
            sort: None,
            group: None,
        }
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn sort(mut self, order: u32, direction: SortDirection) -> Self {
        self.sort = Some(Sort::new(order, direction));
        self
    }

    pub fn group(mut self, depth: usize) -> Self {
        self.group = Some(depth);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_spec_decodes_with_optional_parts() {
        let json = r#"[
            {"name": "host", "expression": "${host}", "group": 0},
            {"name": "count", "expression": "count()", "sort": {"order": 0, "direction": "DESCENDING"}},
            {"name": "note"}
        ]"#;
        let fields: Vec<FieldSpec> = serde_json::from_str(json).unwrap();

        assert_eq!(fields[0], FieldSpec::new("host").expression("${host}").group(0));
        assert_eq!(
            fields[1],
            FieldSpec::new("count")
                .expression("count()")
                .sort(0, SortDirection::Descending)
        );
        assert_eq!(fields[2], FieldSpec::new("note"));
    }
}
