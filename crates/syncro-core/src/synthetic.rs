//! Synthetic state trees
//!
//! Pseudo-random nested values for exercising the codecs and merge logic
//! end to end. Not used at runtime.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::value::{SyncroValue, ValueMap};

/// Latest generated timestamp (2100-01-01)
const MAX_MILLIS: i64 = 4_102_444_800_000;

/// Build a random state mapping nested up to `depth` levels
pub fn build_synthetic_tree(depth: u32) -> SyncroValue {
    build_synthetic_tree_with(&mut rand::rng(), depth)
}

/// Same as [`build_synthetic_tree`] with a caller-supplied generator
pub fn build_synthetic_tree_with<R: Rng + ?Sized>(rng: &mut R, depth: u32) -> SyncroValue {
    SyncroValue::Map(random_map(rng, depth))
}

fn random_map<R: Rng + ?Sized>(rng: &mut R, depth: u32) -> ValueMap {
    let len = rng.random_range(0..=5);
    (0..len)
        .map(|_| (random_key(rng), random_node(rng, depth)))
        .collect()
}

fn random_node<R: Rng + ?Sized>(rng: &mut R, depth: u32) -> SyncroValue {
    if depth == 0 {
        return random_scalar(rng);
    }
    match rng.random_range(0..4) {
        0 => random_scalar(rng),
        1 => SyncroValue::Map(random_map(rng, depth - 1)),
        2 => {
            let len = rng.random_range(0..=4);
            SyncroValue::Array((0..len).map(|_| random_node(rng, depth - 1)).collect())
        }
        // Arrays of arrays are what the flattening exists for
        _ => {
            let len = rng.random_range(1..=3);
            SyncroValue::Array(
                (0..len)
                    .map(|_| {
                        let inner = rng.random_range(0..=3);
                        SyncroValue::Array(
                            (0..inner).map(|_| random_node(rng, depth - 1)).collect(),
                        )
                    })
                    .collect(),
            )
        }
    }
}

fn random_scalar<R: Rng + ?Sized>(rng: &mut R) -> SyncroValue {
    match rng.random_range(0..5) {
        0 => SyncroValue::Null,
        1 => SyncroValue::Bool(rng.random_bool(0.5)),
        2 => SyncroValue::Number(rng.random_range(-1.0e6..1.0e6)),
        3 => SyncroValue::String(random_word(rng, 0)),
        _ => {
            let millis = rng.random_range(0..MAX_MILLIS);
            SyncroValue::Date(DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default())
        }
    }
}

fn random_key<R: Rng + ?Sized>(rng: &mut R) -> String {
    random_word(rng, 1)
}

fn random_word<R: Rng + ?Sized>(rng: &mut R, min_len: usize) -> String {
    let len = rng.random_range(min_len..=10);
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}
