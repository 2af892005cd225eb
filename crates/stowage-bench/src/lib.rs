//! Benchmark profiles for the stowage record store.
//!
//! - [`reference_config`]: 10K slots with the default dynamic share
//! - [`filled_store`]: a store pre-populated with seeded fixtures
//! - [`filled_list`]: a list pre-populated with seeded fixtures

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use stowage_core::{MemoryLocation, Record, StoreConfig};
use stowage_list::{BigList, ListError};
use stowage_store::{Store, StoreError};
use stowage_test_utils::{rng, ChaCha8Rng};

/// Slots in the reference profile.
pub const REFERENCE_SLOTS: u64 = 10_000;

/// Build the reference config: [`REFERENCE_SLOTS`] elements, a dynamic
/// share of 0.8 so every slot can hold a short dynamic string with room
/// left for an overwrite in flight.
pub fn reference_config(location: MemoryLocation) -> StoreConfig {
    StoreConfig::elements(REFERENCE_SLOTS)
        .with_dynamic_ratio(0.8)
        .with_location(location)
}

/// Generate `n` records with `make`, seeded by `seed`.
pub fn records<R, F>(n: usize, seed: u64, mut make: F) -> Vec<R>
where
    F: FnMut(&mut ChaCha8Rng) -> R,
{
    let mut r = rng(seed);
    (0..n).map(|_| make(&mut r)).collect()
}

/// A store for `R` with every slot written from `values`.
pub fn filled_store<R: Record>(
    config: &StoreConfig,
    values: &[R],
) -> Result<Store<R>, StoreError> {
    let mut store = Store::<R>::new(config, 0)?;
    for (i, v) in values.iter().enumerate() {
        store.set(i, Some(v))?;
    }
    Ok(store)
}

/// A list for `R` holding `values` in order.
pub fn filled_list<R: Record>(
    config: &StoreConfig,
    values: &[R],
) -> Result<BigList<R>, ListError> {
    BigList::from_items(config, values)
}
