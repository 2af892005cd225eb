//! A bounded, doubly-linked list of records kept in a stowage arena.
//!
//! [`BigList`] threads its links through the metadata bytes of a
//! [`Store`](stowage_store::Store), so elements never live on the Rust
//! heap. It serves as a list (positional access), a deque (both ends), a
//! queue and a stack. Traversal is by borrowing [`Iter`] or by a detached,
//! fail-fast [`Cursor`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cursor;
pub mod error;
pub mod iter;
pub mod list;

pub use cursor::Cursor;
pub use error::ListError;
pub use iter::Iter;
pub use list::{BigList, METADATA_BYTES};
