//! Command handlers

pub mod codec;
pub mod config;
pub mod coordinate;
pub mod path;
pub mod synth;

use std::io::Read;

use anyhow::{Context, Result};

/// Read a JSON argument, or stdin when it is `-`
pub fn read_json_arg(input: &str) -> Result<serde_json::Value> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        input.to_string()
    };

    serde_json::from_str(&text).context("Input is not valid JSON")
}
