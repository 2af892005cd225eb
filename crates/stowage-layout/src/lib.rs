//! Type layout engine for stowage.
//!
//! Turns a registration-time [`TypeDesc`](stowage_core::TypeDesc) into a
//! [`Layout`]: the deterministic binary shape of one stored element, with
//! field order, byte widths and serialized offsets. Layouts are computed
//! once per distinct type name and cached in a [`LayoutCache`]; a
//! process-wide instance backs [`layout_of`].
//!
//! Every field begins with a one-byte null flag. Payloads follow:
//!
//! | Kind | Payload |
//! |------|---------|
//! | primitive | the value |
//! | fixed string | `i32` length (`-1` absent) + capacity × `u16` |
//! | fixed array / collection | `i32` count + capacity × element |
//! | dynamic string | `u64` dynamic block address |
//! | nested record | the nested layout, inlined |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod layout;

pub use cache::{layout_of, LayoutCache};
pub use layout::{ElementLayout, ElementShape, FieldKind, FieldLayout, Layout, LayoutShape};
