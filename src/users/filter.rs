//! Per-field filter values and their translation into column predicates.
//!
//! The shape of a filter (scalar, `{gte, lte}` range, or list) is fixed when
//! the request is deserialized; [`translate`] only has to map each shape to
//! a predicate.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer};
use time::Date;

/// Inclusive bounds of a range filter. A missing key and an explicit `null`
/// both mean "no bound".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeBounds<T> {
    pub gte: Option<T>,
    pub lte: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterValue<T> {
    List(Vec<Option<T>>),
    Range(RangeBounds<T>),
    Scalar(Option<T>),
}

/// Condition over a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<T> {
    Eq(T),
    IsNull,
    Gte(T),
    Lte(T),
    Between(T, T),
    /// Matches any of `values`, or NULL when `or_null` is set.
    In { values: Vec<T>, or_null: bool },
    /// Substring match on a text column.
    Contains { needle: String, case_insensitive: bool },
}

/// Translate one filter value. `None` means the field places no constraint
/// and is left out of the query entirely.
pub fn translate<T>(value: FilterValue<T>) -> Option<Predicate<T>> {
    match value {
        FilterValue::List(items) => {
            let or_null = items.iter().any(Option::is_none);
            let values = items.into_iter().flatten().collect();
            Some(Predicate::In { values, or_null })
        }
        FilterValue::Range(RangeBounds { gte, lte }) => match (gte, lte) {
            (Some(gte), Some(lte)) => Some(Predicate::Between(gte, lte)),
            (Some(gte), None) => Some(Predicate::Gte(gte)),
            (None, Some(lte)) => Some(Predicate::Lte(lte)),
            (None, None) => None,
        },
        FilterValue::Scalar(Some(v)) => Some(Predicate::Eq(v)),
        FilterValue::Scalar(None) => Some(Predicate::IsNull),
    }
}

impl<T> Predicate<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Predicate<U> {
        match self {
            Predicate::Eq(v) => Predicate::Eq(f(v)),
            Predicate::IsNull => Predicate::IsNull,
            Predicate::Gte(v) => Predicate::Gte(f(v)),
            Predicate::Lte(v) => Predicate::Lte(f(v)),
            Predicate::Between(a, b) => Predicate::Between(f(a), f(b)),
            Predicate::In { values, or_null } => Predicate::In {
                values: values.into_iter().map(f).collect(),
                or_null,
            },
            Predicate::Contains {
                needle,
                case_insensitive,
            } => Predicate::Contains {
                needle,
                case_insensitive,
            },
        }
    }
}

impl Predicate<FieldValue> {
    /// Evaluate against a column value, with SQL NULL semantics: only
    /// `IsNull` and `In { or_null: true }` match a missing value.
    pub fn matches(&self, value: Option<&FieldValue>) -> bool {
        let Some(value) = value else {
            return matches!(
                self,
                Predicate::IsNull | Predicate::In { or_null: true, .. }
            );
        };
        let cmp = |other: &FieldValue| value.partial_cmp(other);
        match self {
            Predicate::Eq(v) => cmp(v) == Some(Ordering::Equal),
            Predicate::IsNull => false,
            Predicate::Gte(v) => matches!(cmp(v), Some(Ordering::Greater | Ordering::Equal)),
            Predicate::Lte(v) => matches!(cmp(v), Some(Ordering::Less | Ordering::Equal)),
            Predicate::Between(lo, hi) => {
                matches!(cmp(lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(cmp(hi), Some(Ordering::Less | Ordering::Equal))
            }
            Predicate::In { values, .. } => values.iter().any(|v| cmp(v) == Some(Ordering::Equal)),
            Predicate::Contains {
                needle,
                case_insensitive,
            } => match value {
                FieldValue::Text(s) if *case_insensitive => {
                    s.to_lowercase().contains(&needle.to_lowercase())
                }
                FieldValue::Text(s) => s.contains(needle.as_str()),
                _ => false,
            },
        }
    }
}

/// Column value carried by a predicate once it is detached from the
/// request's typed field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i32),
    Text(String),
    Date(Date),
}

impl PartialOrd for FieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => a.partial_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => a.partial_cmp(b),
            (FieldValue::Date(a), FieldValue::Date(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Date> for FieldValue {
    fn from(v: Date) -> Self {
        FieldValue::Date(v)
    }
}

/// For `Option<FilterValue<T>>` request fields: an absent key stays `None`
/// (with `#[serde(default)]`) while an explicit `null` becomes
/// `Some(FilterValue::Scalar(None))`.
pub fn present<'de, D, T>(deserializer: D) -> Result<Option<FilterValue<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    FilterValue::deserialize(deserializer).map(Some)
}
