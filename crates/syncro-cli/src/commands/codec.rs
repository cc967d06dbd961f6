//! Encode/decode command handlers

use anyhow::{Context, Result};

use syncro_core::codec::{document_to_json, encode_document, from_fields, to_fields, FieldMap};
use syncro_core::SyncroValue;

use super::read_json_arg;
use crate::output::Output;

/// Encode a JSON state into typed fields (or the flattened realtime shape)
pub fn encode(input: &str, wire: bool, output: &Output) -> Result<()> {
    let value = SyncroValue::from(read_json_arg(input)?);

    let rendered = if wire {
        document_to_json(&encode_document(&value)?)
    } else {
        serde_json::to_value(to_fields(&value)?).context("Failed to serialize fields")?
    };

    output.print_value(&rendered);
    Ok(())
}

/// Decode typed fields back into plain JSON
pub fn decode(input: &str, output: &Output) -> Result<()> {
    let fields: FieldMap = serde_json::from_value(read_json_arg(input)?)
        .context("Input is not a typed-field map")?;

    output.print_value(&from_fields(&fields).to_json());
    Ok(())
}
