//! Store error types.

use stowage_arena::ArenaError;
use stowage_core::{ConfigError, SchemaError, ValueError};
use thiserror::Error;

/// Errors from store construction and access.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Slot index at or past capacity.
    #[error("index {index} out of bounds for capacity {capacity}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Store capacity.
        capacity: usize,
    },
    /// Raw access reaching past the end of a slot.
    #[error("{width}-byte access at offset {offset} exceeds slot of {node_size} bytes")]
    OffsetOutOfBounds {
        /// Offset within the slot.
        offset: usize,
        /// Access width.
        width: usize,
        /// Slot size.
        node_size: usize,
    },
    /// Raw access touching the status byte or reserved status bits.
    #[error("illegal access: {0}")]
    IllegalAccess(&'static str),
    /// Stored bytes that no valid write could have produced.
    #[error("corrupt slot data at offset {offset}: {reason}")]
    Corrupt {
        /// Arena offset of the bad data.
        offset: usize,
        /// What was wrong.
        reason: &'static str,
    },
    /// The element type has no valid layout.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The store configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Arena access or dynamic allocation failed.
    #[error(transparent)]
    Arena(#[from] ArenaError),
    /// A value does not match the store's layout.
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl StoreError {
    /// Whether this is a recoverable dynamic-segment exhaustion.
    pub fn is_out_of_dynamic_memory(&self) -> bool {
        matches!(self, Self::Arena(ArenaError::OutOfDynamicMemory { .. }))
    }
}
