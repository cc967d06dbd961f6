//! Realtime document codec
//!
//! Encoding builds a new tree from a shared borrow, so the caller's live
//! value is never touched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::error::{SyncroError, SyncroResult};
use crate::value::{SyncroValue, ValueMap};

/// Reserved key marking a flattened sequence
pub const ARRAY_MARKER_KEY: &str = "_";

/// Value stored under [`ARRAY_MARKER_KEY`]
pub const ARRAY_MARKER: &str = "~array";

/// A realtime document: top-level fields
pub type WireDocument = BTreeMap<String, WireValue>;

/// A value as stored in the realtime layer
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Map(WireDocument),
}

impl WireValue {
    /// Whether this mapping is a flattened sequence
    pub fn is_flattened_array(&self) -> bool {
        match self {
            WireValue::Map(map) => is_array_marker(map),
            _ => false,
        }
    }

    /// Render as plain JSON; timestamps become RFC 3339 strings
    pub fn to_json(&self) -> JsonValue {
        match self {
            WireValue::Null => JsonValue::Null,
            WireValue::Bool(b) => JsonValue::Bool(*b),
            WireValue::Number(n) => JsonNumber::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            WireValue::String(s) => JsonValue::String(s.clone()),
            WireValue::Timestamp(d) => JsonValue::String(d.to_rfc3339()),
            WireValue::Map(map) => document_to_json(map),
        }
    }
}

/// Render a document as a JSON object
pub fn document_to_json(doc: &WireDocument) -> JsonValue {
    JsonValue::Object(
        doc.iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<JsonMap<_, _>>(),
    )
}

fn is_array_marker(map: &WireDocument) -> bool {
    matches!(map.get(ARRAY_MARKER_KEY), Some(WireValue::String(s)) if s == ARRAY_MARKER)
}

/// Encode a native value for the realtime store
pub fn encode(value: &SyncroValue) -> WireValue {
    match value {
        SyncroValue::Null => WireValue::Null,
        SyncroValue::Bool(b) => WireValue::Bool(*b),
        SyncroValue::Number(n) => WireValue::Number(*n),
        SyncroValue::String(s) => WireValue::String(s.clone()),
        SyncroValue::Date(d) => WireValue::Timestamp(*d),
        SyncroValue::Map(map) => WireValue::Map(encode_map(map)),
        SyncroValue::Array(items) => {
            let mut flat = WireDocument::new();
            flat.insert(
                ARRAY_MARKER_KEY.to_string(),
                WireValue::String(ARRAY_MARKER.to_string()),
            );
            for (index, item) in items.iter().enumerate() {
                flat.insert(index.to_string(), encode(item));
            }
            WireValue::Map(flat)
        }
    }
}

fn encode_map(map: &ValueMap) -> WireDocument {
    map.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// Decode a realtime value back to its native shape
pub fn decode(value: &WireValue) -> SyncroValue {
    match value {
        WireValue::Null => SyncroValue::Null,
        WireValue::Bool(b) => SyncroValue::Bool(*b),
        WireValue::Number(n) => SyncroValue::Number(*n),
        WireValue::String(s) => SyncroValue::String(s.clone()),
        WireValue::Timestamp(d) => SyncroValue::Date(*d),
        WireValue::Map(map) if is_array_marker(map) => {
            let mut indexed: Vec<(usize, &WireValue)> = map
                .iter()
                .filter(|(k, _)| k.as_str() != ARRAY_MARKER_KEY)
                .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
                .collect();
            indexed.sort_by_key(|(i, _)| *i);
            SyncroValue::Array(indexed.into_iter().map(|(_, v)| decode(v)).collect())
        }
        WireValue::Map(map) => SyncroValue::Map(decode_map(map)),
    }
}

fn decode_map(map: &WireDocument) -> ValueMap {
    map.iter().map(|(k, v)| (k.clone(), decode(v))).collect()
}

/// Encode a top-level state mapping as a document
///
/// A null state encodes as an empty document.
pub fn encode_document(value: &SyncroValue) -> SyncroResult<WireDocument> {
    match value {
        SyncroValue::Map(map) => Ok(encode_map(map)),
        SyncroValue::Null => Ok(WireDocument::new()),
        other => Err(SyncroError::Codec(format!(
            "document root must be a mapping, got {}",
            kind(other)
        ))),
    }
}

/// Decode a document into a state mapping
pub fn decode_document(doc: &WireDocument) -> SyncroValue {
    SyncroValue::Map(decode_map(doc))
}

fn kind(value: &SyncroValue) -> &'static str {
    match value {
        SyncroValue::Null => "null",
        SyncroValue::Bool(_) => "boolean",
        SyncroValue::Number(_) => "number",
        SyncroValue::String(_) => "string",
        SyncroValue::Date(_) => "date",
        SyncroValue::Map(_) => "mapping",
        SyncroValue::Array(_) => "sequence",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_array_flattening() {
        let value = SyncroValue::from(json!(["a", 2]));
        let wire = encode(&value);

        let WireValue::Map(map) = &wire else {
            panic!("expected flattened map");
        };
        assert_eq!(map.get("_"), Some(&WireValue::String("~array".to_string())));
        assert_eq!(map.get("0"), Some(&WireValue::String("a".to_string())));
        assert_eq!(map.get("1"), Some(&WireValue::Number(2.0)));
        assert!(wire.is_flattened_array());
    }

    #[test]
    fn test_nested_arrays_round_trip() {
        let value = SyncroValue::from(json!({
            "grid": [[1, 2], [3, [4, 5]], []],
            "meta": {"tags": ["x", {"deep": [true, null]}]}
        }));
        assert_eq!(decode(&encode(&value)), value);
    }

    #[test]
    fn test_dates_distinct_from_strings() {
        let mut map = ValueMap::new();
        map.insert("when".to_string(), SyncroValue::Date(date()));
        map.insert("label".to_string(), SyncroValue::from(date().to_rfc3339()));
        let value = SyncroValue::Map(map);

        let doc = encode_document(&value).unwrap();
        assert_eq!(doc.get("when"), Some(&WireValue::Timestamp(date())));
        assert!(matches!(doc.get("label"), Some(WireValue::String(_))));

        assert_eq!(decode_document(&doc), value);
    }

    #[test]
    fn test_decode_orders_by_numeric_index() {
        let mut flat = WireDocument::new();
        flat.insert("_".to_string(), WireValue::String("~array".to_string()));
        flat.insert("10".to_string(), WireValue::Number(10.0));
        flat.insert("2".to_string(), WireValue::Number(2.0));
        flat.insert("0".to_string(), WireValue::Number(0.0));

        // BTreeMap iterates "0", "10", "2"; decode must sort numerically
        assert_eq!(
            decode(&WireValue::Map(flat)),
            SyncroValue::from(json!([0, 2, 10]))
        );
    }

    #[test]
    fn test_document_json_shows_flattening() {
        let doc = encode_document(&SyncroValue::from(json!({"tags": ["a"]}))).unwrap();
        assert_eq!(
            document_to_json(&doc),
            json!({"tags": {"_": "~array", "0": "a"}})
        );
    }

    #[test]
    fn test_encode_does_not_mutate_input() {
        let value = SyncroValue::from(json!({"list": [1, 2, 3]}));
        let before = value.clone();
        let _ = encode(&value);
        assert_eq!(value, before);
    }

    #[test]
    fn test_encode_document_rejects_scalars() {
        assert!(encode_document(&SyncroValue::from(1.0)).is_err());
        assert!(encode_document(&SyncroValue::Array(vec![])).is_err());
        assert!(encode_document(&SyncroValue::Null).unwrap().is_empty());
    }

    #[test]
    fn test_plain_map_with_underscore_key() {
        let value = SyncroValue::from(json!({"_": "private", "0": "zero"}));
        assert_eq!(decode(&encode(&value)), value);
    }
}
