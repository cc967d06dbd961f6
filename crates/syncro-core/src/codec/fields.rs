//! Typed-field codec
//!
//! The REST flavour of the realtime store wraps every value in a
//! discriminated tag:
//!
//! ```text
//! {"stringValue": "x"}  {"doubleValue": 1.5}  {"booleanValue": true}
//! {"nullValue": null}   {"timestampValue": "2024-03-09T12:30:00Z"}
//! {"mapValue": {"fields": {...}}}  {"arrayValue": {"values": [...]}}
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SyncroError, SyncroResult};
use crate::value::SyncroValue;

/// Top-level document fields
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One tagged value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldValue {
    StringValue(String),
    DoubleValue(f64),
    BooleanValue(bool),
    NullValue(()),
    TimestampValue(DateTime<Utc>),
    MapValue(MapValue),
    ArrayValue(ArrayValue),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: FieldMap,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

/// Wrap a single value
pub fn to_field_value(value: &SyncroValue) -> FieldValue {
    match value {
        SyncroValue::Null => FieldValue::NullValue(()),
        SyncroValue::Bool(b) => FieldValue::BooleanValue(*b),
        SyncroValue::Number(n) => FieldValue::DoubleValue(*n),
        SyncroValue::String(s) => FieldValue::StringValue(s.clone()),
        SyncroValue::Date(d) => FieldValue::TimestampValue(*d),
        SyncroValue::Map(map) => FieldValue::MapValue(MapValue {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), to_field_value(v)))
                .collect(),
        }),
        SyncroValue::Array(items) => FieldValue::ArrayValue(ArrayValue {
            values: items.iter().map(to_field_value).collect(),
        }),
    }
}

/// Unwrap a single value
pub fn from_field_value(value: &FieldValue) -> SyncroValue {
    match value {
        FieldValue::NullValue(()) => SyncroValue::Null,
        FieldValue::BooleanValue(b) => SyncroValue::Bool(*b),
        FieldValue::DoubleValue(n) => SyncroValue::Number(*n),
        FieldValue::StringValue(s) => SyncroValue::String(s.clone()),
        FieldValue::TimestampValue(d) => SyncroValue::Date(*d),
        FieldValue::MapValue(map) => from_fields(&map.fields),
        FieldValue::ArrayValue(array) => {
            SyncroValue::Array(array.values.iter().map(from_field_value).collect())
        }
    }
}

/// Convert a state mapping into typed document fields
pub fn to_fields(value: &SyncroValue) -> SyncroResult<FieldMap> {
    match value {
        SyncroValue::Map(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), to_field_value(v)))
            .collect()),
        SyncroValue::Null => Ok(FieldMap::new()),
        _ => Err(SyncroError::Codec(
            "typed fields require a mapping at the root".to_string(),
        )),
    }
}

/// Convert typed document fields back into a state mapping
pub fn from_fields(fields: &FieldMap) -> SyncroValue {
    SyncroValue::Map(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), from_field_value(v)))
            .collect(),
    )
}
