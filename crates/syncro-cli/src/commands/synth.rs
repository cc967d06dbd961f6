//! Synthetic tree command handler

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use syncro_core::synthetic::{build_synthetic_tree, build_synthetic_tree_with};

use crate::output::Output;

/// Print a random state tree
pub fn generate(depth: u32, seed: Option<u64>, output: &Output) -> Result<()> {
    let tree = match seed {
        Some(seed) => build_synthetic_tree_with(&mut StdRng::seed_from_u64(seed), depth),
        None => build_synthetic_tree(depth),
    };

    output.print_value(&tree.to_json());
    Ok(())
}
