//! Wire codecs
//!
//! Two representations of a [`SyncroValue`](crate::value::SyncroValue):
//!
//! - `wire`: the realtime store's document shape. The store cannot hold
//!   arrays nested in arrays, so every sequence is flattened into a
//!   mapping tagged with `{"_": "~array"}`.
//! - `fields`: the typed-field union used by low-level REST access
//!   (`stringValue`, `doubleValue`, `mapValue`, ...).

pub mod fields;
pub mod wire;

pub use fields::{from_fields, to_fields, FieldMap, FieldValue};
pub use wire::{
    decode, decode_document, document_to_json, encode, encode_document, WireDocument, WireValue,
};
