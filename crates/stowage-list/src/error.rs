//! List error types.

use stowage_core::ValueError;
use stowage_store::StoreError;
use thiserror::Error;

/// Errors from [`BigList`](crate::BigList) operations.
#[derive(Debug, Error)]
pub enum ListError {
    /// Position outside `0..len` (or `0..=len` for insertion).
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested position.
        index: usize,
        /// Current length.
        len: usize,
    },
    /// Every slot of the underlying store is in use.
    #[error("list is full at capacity {capacity}")]
    Full {
        /// Store capacity.
        capacity: usize,
    },
    /// No element at the requested end.
    #[error("list is empty")]
    Empty,
    /// The list was structurally modified behind a cursor's back.
    #[error("list modified outside the cursor")]
    ConcurrentModification,
    /// A cursor operation that needs a current element was called without
    /// one.
    #[error("illegal cursor state: {0}")]
    IllegalState(&'static str),
    /// Slot indices must fit the 32-bit link fields.
    #[error("capacity {capacity} exceeds the largest linkable index")]
    CapacityTooLarge {
        /// Requested store capacity.
        capacity: usize,
    },
    /// A link field points nowhere while the list length says otherwise.
    #[error("broken link at slot {slot}")]
    BrokenLink {
        /// Slot whose link is missing.
        slot: usize,
    },
    /// Failure in the underlying store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValueError> for ListError {
    fn from(err: ValueError) -> Self {
        Self::Store(err.into())
    }
}
