//! Core types and traits for stowage.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by every other crate in the workspace: schema
//! descriptors, the dynamic [`Value`] model, the [`Record`] trait that
//! bridges Rust types to that model, store configuration, and the
//! schema/value/config error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod record;
pub mod schema;
pub mod value;

pub use config::{MemoryLocation, SizeType, StoreConfig};
pub use error::{ConfigError, SchemaError, ValueError};
pub use record::{FieldReader, Record};
pub use schema::{CollectionType, ConcreteCollection, FieldDef, Primitive, Schema, TypeDesc};
pub use value::Value;
