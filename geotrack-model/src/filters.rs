use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document field holding the owning dealer.
pub const TENANT_FIELD: &str = "dealerId";
/// Document field discriminating user documents (`"worker"` for field workers).
pub const TYPE_FIELD: &str = "type";
pub const WORK_GROUP_FIELD: &str = "workGroup";
pub const STATUS_FIELD: &str = "status";

/// Right-hand side of an equality constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl FilterValue {
    /// Strict equality against a document value; no cross-type coercion.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (FilterValue::Bool(expected), Value::Bool(actual)) => expected == actual,
            (FilterValue::Int(expected), Value::Number(actual)) => {
                actual.as_i64() == Some(*expected)
            }
            (FilterValue::Str(expected), Value::String(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(value) => write!(f, "{value}"),
            FilterValue::Int(value) => write!(f, "{value}"),
            FilterValue::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Str(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Str(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// `field == value` constraint evaluated by the geo index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: FilterValue,
}

impl FieldFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.field, self.value)
    }
}

/// Ordered list of equality constraints.
///
/// Two sets are equal only when they hold the same constraints in the same
/// order, so `[a, b]` and `[b, a]` are treated as different queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(pub Vec<FieldFilter>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: FieldFilter) -> Self {
        self.0.push(filter);
        self
    }

    pub fn push(&mut self, filter: FieldFilter) {
        self.0.push(filter);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldFilter> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.0
            .iter()
            .find(|filter| filter.field == field)
            .map(|filter| &filter.value)
    }

    /// True when every constraint is satisfied by the document's fields.
    pub fn matches(&self, fields: &serde_json::Map<String, Value>) -> bool {
        self.0.iter().all(|filter| {
            fields
                .get(&filter.field)
                .is_some_and(|value| filter.value.matches(value))
        })
    }
}

impl FromIterator<FieldFilter> for FilterSet {
    fn from_iter<T: IntoIterator<Item = FieldFilter>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
