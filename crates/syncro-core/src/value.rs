//! Native value model
//!
//! `SyncroValue` is the in-memory shape of a floating entity's state: a
//! JSON-like tree that also carries dates as a first-class variant so they
//! survive the trip through the realtime store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

/// A mapping of field names to values
pub type ValueMap = BTreeMap<String, SyncroValue>;

/// A JSON-compatible value with explicit dates
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SyncroValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Map(ValueMap),
    Array(Vec<SyncroValue>),
}

impl SyncroValue {
    /// An empty mapping
    pub fn empty_map() -> Self {
        SyncroValue::Map(ValueMap::new())
    }

    /// True for null, empty mappings and empty sequences
    pub fn is_empty(&self) -> bool {
        match self {
            SyncroValue::Null => true,
            SyncroValue::Map(map) => map.is_empty(),
            SyncroValue::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            SyncroValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ValueMap> {
        match self {
            SyncroValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a top-level field of a mapping
    pub fn get(&self, key: &str) -> Option<&SyncroValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Recursively merge `other` into `self`
    ///
    /// Mappings merge key by key; every other combination replaces.
    pub fn deep_merge(&mut self, other: SyncroValue) {
        match (self, other) {
            (SyncroValue::Map(target), SyncroValue::Map(source)) => {
                for (key, value) in source {
                    match target.get_mut(&key) {
                        Some(existing) => existing.deep_merge(value),
                        None => {
                            target.insert(key, value);
                        }
                    }
                }
            }
            (slot, value) => *slot = value,
        }
    }

    /// Convert to plain JSON; dates become RFC 3339 strings
    pub fn to_json(&self) -> JsonValue {
        match self {
            SyncroValue::Null => JsonValue::Null,
            SyncroValue::Bool(b) => JsonValue::Bool(*b),
            SyncroValue::Number(n) => JsonNumber::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            SyncroValue::String(s) => JsonValue::String(s.clone()),
            SyncroValue::Date(d) => JsonValue::String(d.to_rfc3339()),
            SyncroValue::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<JsonMap<_, _>>(),
            ),
            SyncroValue::Array(items) => {
                JsonValue::Array(items.iter().map(SyncroValue::to_json).collect())
            }
        }
    }
}

impl From<JsonValue> for SyncroValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => SyncroValue::Null,
            JsonValue::Bool(b) => SyncroValue::Bool(b),
            JsonValue::Number(n) => SyncroValue::Number(n.as_f64().unwrap_or_default()),
            JsonValue::String(s) => SyncroValue::String(s),
            JsonValue::Array(items) => {
                SyncroValue::Array(items.into_iter().map(SyncroValue::from).collect())
            }
            JsonValue::Object(map) => SyncroValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, SyncroValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for SyncroValue {
    fn from(value: bool) -> Self {
        SyncroValue::Bool(value)
    }
}

impl From<f64> for SyncroValue {
    fn from(value: f64) -> Self {
        SyncroValue::Number(value)
    }
}

impl From<i64> for SyncroValue {
    fn from(value: i64) -> Self {
        SyncroValue::Number(value as f64)
    }
}

impl From<i32> for SyncroValue {
    fn from(value: i32) -> Self {
        SyncroValue::Number(f64::from(value))
    }
}

impl From<&str> for SyncroValue {
    fn from(value: &str) -> Self {
        SyncroValue::String(value.to_string())
    }
}

impl From<String> for SyncroValue {
    fn from(value: String) -> Self {
        SyncroValue::String(value)
    }
}

impl From<DateTime<Utc>> for SyncroValue {
    fn from(value: DateTime<Utc>) -> Self {
        SyncroValue::Date(value)
    }
}

impl From<ValueMap> for SyncroValue {
    fn from(value: ValueMap) -> Self {
        SyncroValue::Map(value)
    }
}

impl From<Vec<SyncroValue>> for SyncroValue {
    fn from(value: Vec<SyncroValue>) -> Self {
        SyncroValue::Array(value)
    }
}
