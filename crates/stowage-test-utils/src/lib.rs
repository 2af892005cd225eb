//! Test utilities for stowage development.
//!
//! Provides the standard record fixtures ([`PrimitiveRecord`],
//! [`FixedLengthRecord`], [`DynamicRecord`], [`GenericRecord`]), each with a
//! seeded random constructor, plus a tracing hook for tests that want to
//! see store and allocator events.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{DynamicRecord, FixedLengthRecord, GenericRecord, PrimitiveRecord};

pub use rand_chacha::ChaCha8Rng;

use rand::SeedableRng;
use tracing_subscriber::filter::LevelFilter;

/// Deterministic RNG for fixtures.
pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}
