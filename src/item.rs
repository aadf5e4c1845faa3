use crate::value::{Generator, Val};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path of group values from the top of the hierarchy, one value per depth.
///
/// The empty key is the root: the parent of every depth-0 row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(Vec<Val>);

impl Key {
    pub fn new(values: impl Into<Vec<Val>>) -> Self {
        Self(values.into())
    }

    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Val] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The key with its last value removed. The root is its own parent.
    pub fn parent(&self) -> Key {
        let end = self.0.len().saturating_sub(1);
        Key(self.0[..end].to_vec())
    }

    /// Extends this key by one level.
    pub fn child(&self, value: impl Into<Val>) -> Key {
        let mut values = self.0.clone();
        values.push(value.into());
        Key(values)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", value)?;
        }
        write!(f, "]")
    }
}

/// Identity of a single row.
///
/// Grouped rows are identified by their full group key and are combined with
/// any other row carrying the same key. Detail rows have no key of their own:
/// they only record which group they sit beneath and are never combined.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Group(Key),
    Detail { parent: Key },
}

impl RowKey {
    /// A grouped row key. An empty key has no group of its own and makes
    /// a top-level detail row instead.
    pub fn group(values: impl Into<Vec<Val>>) -> Self {
        let key = Key::new(values);
        if key.is_root() {
            RowKey::detail(key)
        } else {
            RowKey::Group(key)
        }
    }

    pub fn detail(parent: Key) -> Self {
        RowKey::Detail { parent }
    }

    pub fn is_detail(&self) -> bool {
        matches!(self, RowKey::Detail { .. })
    }

    /// Own group key, `None` for detail rows.
    pub fn key(&self) -> Option<&Key> {
        match self {
            RowKey::Group(key) => Some(key),
            RowKey::Detail { .. } => None,
        }
    }

    pub fn parent(&self) -> Key {
        match self {
            RowKey::Group(key) => key.parent(),
            RowKey::Detail { parent } => parent.clone(),
        }
    }

    /// Nesting level of this row, 0 being the top level.
    pub fn depth(&self) -> usize {
        match self {
            RowKey::Group(key) => key.len().saturating_sub(1),
            RowKey::Detail { parent } => parent.len(),
        }
    }
}

/// One aggregated row: its key and one generator slot per field.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub key: RowKey,
    pub generators: Box<[Option<Generator>]>,
}

impl Item {
    pub fn new(key: RowKey, generators: impl Into<Box<[Option<Generator>]>>) -> Self {
        Self {
            key,
            generators: generators.into(),
        }
    }

    pub fn generator(&self, field: usize) -> Option<&Generator> {
        self.generators.get(field).and_then(Option::as_ref)
    }
}
