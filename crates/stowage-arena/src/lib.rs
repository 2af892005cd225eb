//! Byte arenas and dynamic-segment allocation for stowage.
//!
//! Provides the raw storage every store is built on: a contiguous,
//! zero-initialised byte region with checked fixed-width access, and a
//! free-list allocator that carves variable-sized blocks out of a
//! sub-range of that region. This is the only crate in the workspace
//! that contains `unsafe` code, confined to `raw.rs`.
//!
//! # Architecture
//!
//! ```text
//! ByteArena (single owner, released by consuming or dropping)
//! ├── NativeBlock | Vec<u8>      (backing, chosen by MemoryLocation)
//! └── [static segment][dynamic segment]
//!                      └── DynamicAllocator (address-ordered free list,
//!                          first-fit, split on allocate, coalesce on free)
//! ```
//!
//! Slot structure is not known here; the store crate lays slots over the
//! static segment and hands the dynamic segment to [`DynamicAllocator`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod dynamic;
pub mod error;
mod raw;
pub mod scalar;

pub use arena::ByteArena;
pub use dynamic::{DynamicAllocator, FreeBlock};
pub use error::ArenaError;
pub use scalar::Scalar;
