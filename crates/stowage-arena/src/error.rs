//! Arena-specific error types.

use thiserror::Error;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// An access reaches past the end of the arena.
    #[error("access of {len} bytes at offset {offset} exceeds arena of {size} bytes")]
    OutOfBounds {
        /// Start of the access.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Arena size in bytes.
        size: usize,
    },
    /// The backing memory could not be obtained.
    #[error("failed to allocate {bytes} bytes of arena memory")]
    AllocationFailed {
        /// Requested arena size.
        bytes: usize,
    },
    /// No free block in the dynamic segment can hold the request.
    /// Recoverable: nothing was modified.
    #[error("out of dynamic memory: requested {requested} bytes, largest free block {largest_free}")]
    OutOfDynamicMemory {
        /// Requested payload size.
        requested: usize,
        /// Largest free payload at the time of the request.
        largest_free: usize,
    },
    /// An address that does not name a live block of the dynamic segment.
    #[error("address {address} is not a live dynamic block")]
    InvalidBlock {
        /// The rejected address.
        address: usize,
    },
    /// A dynamic segment placed where block addresses would be ambiguous.
    #[error("dynamic segment at {base} of {len} bytes is not usable")]
    InvalidSegment {
        /// Segment start.
        base: usize,
        /// Segment length.
        len: usize,
    },
}
