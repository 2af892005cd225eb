//! Stowage: fixed-shape record storage in preallocated byte arenas.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all stowage sub-crates. For most users, adding `stowage` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use stowage::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Sample {
//!     id: u32,
//!     label: String,
//! }
//!
//! impl Record for Sample {
//!     fn schema() -> TypeDesc {
//!         Schema::new("demo::Sample")
//!             .field("id", TypeDesc::Primitive(Primitive::U32))
//!             .field("label", TypeDesc::Str)
//!             .into_desc()
//!     }
//!
//!     fn to_value(&self) -> Value {
//!         Value::Record(vec![self.id.into(), self.label.as_str().into()])
//!     }
//!
//!     fn from_value(value: Value) -> Result<Self, ValueError> {
//!         let mut f = FieldReader::new("demo::Sample", value, 2)?;
//!         Ok(Self { id: f.read()?, label: f.read()? })
//!     }
//! }
//!
//! let config = StoreConfig::elements(16).with_dynamic_ratio(0.5);
//!
//! let mut store = Store::<Sample>::new(&config, 0).unwrap();
//! let s = Sample { id: 7, label: "seven".into() };
//! store.set(3, Some(&s)).unwrap();
//! assert_eq!(store.get(3).unwrap(), Some(s));
//! assert_eq!(store.get(4).unwrap(), None);
//!
//! let mut list = BigList::<Sample>::new(&config).unwrap();
//! list.push_back(&Sample { id: 1, label: "a".into() }).unwrap();
//! list.push_front(&Sample { id: 0, label: "b".into() }).unwrap();
//! assert_eq!(list.get(1).unwrap().id, 1);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `stowage-core` | Schemas, values, the `Record` trait, config, errors |
//! | [`arena`] | `stowage-arena` | Byte arenas and the dynamic-segment allocator |
//! | [`layout`] | `stowage-layout` | Type layout engine and layout cache |
//! | [`store`] | `stowage-store` | Raw and typed slot stores |
//! | [`list`] | `stowage-list` | Arena-backed doubly-linked list and deque |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Schemas, values, configuration and the [`types::Record`] trait
/// (`stowage-core`).
pub use stowage_core as types;

/// Byte arenas and the free-list allocator (`stowage-arena`).
pub use stowage_arena as arena;

/// Type layout engine (`stowage-layout`).
///
/// [`layout::layout_of`] resolves a type descriptor through the
/// process-wide cache.
pub use stowage_layout as layout;

/// Slot stores (`stowage-store`).
///
/// [`store::RawStore`] works on dynamic values; [`store::Store`] is the
/// typed front end.
pub use stowage_store as store;

/// Arena-backed list, deque, queue and stack (`stowage-list`).
pub use stowage_list as list;

/// Common imports for typical stowage usage.
///
/// ```rust
/// use stowage::prelude::*;
/// ```
pub mod prelude {
    // Schemas and values
    pub use stowage_core::{
        CollectionType, FieldReader, Primitive, Record, Schema, TypeDesc, Value,
    };

    // Configuration
    pub use stowage_core::{MemoryLocation, SizeType, StoreConfig};

    // Errors
    pub use stowage_core::{ConfigError, SchemaError, ValueError};
    pub use stowage_list::ListError;
    pub use stowage_store::StoreError;

    // Stores and lists
    pub use stowage_list::{BigList, Cursor};
    pub use stowage_store::{RawStore, Store};
}
