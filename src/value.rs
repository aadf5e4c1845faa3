//! Row values and the per-field accumulators ("generators") attached to rows.
//!
//! A [`Val`] is a single comparable value, used both for group keys and as the
//! evaluated output of a [`Generator`]. Generators are combined pairwise when
//! two rows with the same group key meet; every combination is associative, so
//! partial results from different shards can be folded in any grouping.

use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    cmp::Ordering,
    hash::{Hash, Hasher},
};

/// A single comparable value.
///
/// Values of different kinds order by kind first (`Null` lowest, then
/// booleans, integers, doubles and text). Doubles use IEEE total ordering so
/// that every value has a place in a sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Val {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    Text(String),
}

impl Val {
    fn rank(&self) -> u8 {
        match self {
            Val::Null => 0,
            Val::Boolean(_) => 1,
            Val::Long(_) => 2,
            Val::Double(_) => 3,
            Val::Text(_) => 4,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }
}

impl Ord for Val {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Val::Null, Val::Null) => Ordering::Equal,
            (Val::Boolean(a), Val::Boolean(b)) => a.cmp(b),
            (Val::Long(a), Val::Long(b)) => a.cmp(b),
            (Val::Double(a), Val::Double(b)) => a.total_cmp(b),
            (Val::Text(a), Val::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Val {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Val {}

impl Hash for Val {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Val::Null => {}
            Val::Boolean(b) => b.hash(state),
            Val::Long(n) => n.hash(state),
            // total_cmp equality is bit equality
            Val::Double(d) => d.to_bits().hash(state),
            Val::Text(s) => s.hash(state),
        }
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Text(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Text(s)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Long(n)
    }
}

impl From<f64> for Val {
    fn from(d: f64) -> Self {
        Val::Double(d)
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Boolean(b)
    }
}

/// Per-field accumulator carried by a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Generator {
    /// First value observed; used for grouped and plain projected fields.
    Value(Val),
    Count(u64),
    Sum(f64),
    Min(Val),
    Max(Val),
}

impl Generator {
    /// Folds `other` into `self`.
    ///
    /// Returns `other` back when the two accumulators are of different kinds.
    pub fn combine(&mut self, other: Generator) -> std::result::Result<(), Generator> {
        match (self, other) {
            (Generator::Value(current), Generator::Value(added)) => {
                if current.is_null() {
                    *current = added;
                }
            }
            (Generator::Count(current), Generator::Count(added)) => {
                *current = current.saturating_add(added);
            }
            (Generator::Sum(current), Generator::Sum(added)) => *current += added,
            (Generator::Min(current), Generator::Min(added)) => {
                if current.is_null() || (!added.is_null() && added < *current) {
                    *current = added;
                }
            }
            (Generator::Max(current), Generator::Max(added)) => {
                if added > *current {
                    *current = added;
                }
            }
            (_, other) => return Err(other),
        }
        Ok(())
    }

    /// The accumulated value.
    pub fn eval(&self) -> Cow<'_, Val> {
        match self {
            Generator::Value(v) | Generator::Min(v) | Generator::Max(v) => Cow::Borrowed(v),
            Generator::Count(n) => Cow::Owned(Val::Long(i64::try_from(*n).unwrap_or(i64::MAX))),
            Generator::Sum(d) => Cow::Owned(Val::Double(*d)),
        }
    }

    pub fn compare(&self, other: &Generator) -> Ordering {
        self.eval().as_ref().cmp(other.eval().as_ref())
    }
}
