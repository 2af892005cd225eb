//! Index-addressed record storage for stowage.
//!
//! A store owns one [`ByteArena`](stowage_arena::ByteArena), split into a
//! static segment of fixed-size slots and a dynamic segment managed by a
//! [`DynamicAllocator`](stowage_arena::DynamicAllocator):
//!
//! ```text
//! [slot 0][slot 1]...[slot capacity-1][dynamic segment.................]
//!  │
//!  └─ [status][metadata × metadata_bytes][payload × layout.length]
//! ```
//!
//! [`RawStore`] works on [`Value`](stowage_core::Value)s and any
//! [`Layout`](stowage_layout::Layout); [`Store`] is the typed front end
//! for a [`Record`](stowage_core::Record) type.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod codec;
pub mod error;
pub mod raw;
pub mod sizing;
pub mod status;
pub mod typed;

pub use error::StoreError;
pub use raw::RawStore;
pub use sizing::Sizing;
pub use typed::Store;
