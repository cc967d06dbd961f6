//! Path command handler

use anyhow::Result;

use syncro_core::path::{parse, ParseOptions};

use crate::output::{Output, OutputFormat};

/// Parse and describe a syncro path
pub fn parse_path(input: &str, allow_wildcard: bool, output: &Output) -> Result<()> {
    let mut options = ParseOptions::default();
    if allow_wildcard {
        options = options.allow_wildcard();
    }
    let path = parse(input, options)?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "entity": path.entity,
                    "id": path.id,
                    "relation": path.relation,
                    "collection": path.collection(),
                    "doc_id": path.doc_id(),
                    "wildcard": path.is_wildcard()
                })
            );
        }
        OutputFormat::Quiet => println!("{}", path.doc_id()),
        OutputFormat::Human => {
            println!("Entity:     {}", path.entity);
            println!("ID:         {}", path.id);
            println!(
                "Relation:   {}",
                path.relation.as_deref().unwrap_or("(none)")
            );
            println!("Document:   {}/{}", path.collection(), path.doc_id());
            if path.is_wildcard() {
                println!("Wildcard:   yes");
            }
        }
    }

    Ok(())
}
