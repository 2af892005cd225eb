//! Error types shared across the stowage workspace.
//!
//! Organized by the phase in which they surface: [`SchemaError`] at
//! layout time, [`ValueError`] when a [`Value`](crate::Value) does not
//! have the shape a layout or record expects, and [`ConfigError`] when
//! store configuration is invalid or cannot be loaded.

use std::path::PathBuf;

use thiserror::Error;

/// A record shape that cannot be given a fixed binary layout.
///
/// Always raised before any store is constructed; never retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A field is declared with an abstract (trait object) type.
    #[error("field '{record}.{field}' has abstract type '{interface}'")]
    InterfaceField {
        /// Record containing the field.
        record: String,
        /// Offending field.
        field: String,
        /// Name of the abstract type.
        interface: String,
    },
    /// An array or collection field has an abstract element type.
    #[error("field '{record}.{field}' has abstract element type '{interface}'")]
    InterfaceElement {
        /// Record containing the field.
        record: String,
        /// Offending field.
        field: String,
        /// Name of the abstract element type.
        interface: String,
    },
    /// An array or collection whose elements are themselves sequences.
    #[error("field '{record}.{field}' nests a sequence inside a sequence")]
    NestedSequence {
        /// Record containing the field.
        record: String,
        /// Offending field.
        field: String,
    },
    /// An abstract collection type with no default implementation.
    #[error("field '{record}.{field}': collection type '{collection}' cannot be resolved")]
    UnresolvableCollection {
        /// Record containing the field.
        record: String,
        /// Offending field.
        field: String,
        /// Name of the collection type.
        collection: String,
    },
    /// A map collection whose element is not a two-field entry record.
    #[error("field '{record}.{field}': map entries must be records with 2 fields, found {found}")]
    MapEntryShape {
        /// Record containing the field.
        record: String,
        /// Offending field.
        field: String,
        /// Number of fields found on the element type.
        found: usize,
    },
    /// An array or collection without a fixed capacity.
    #[error("field '{record}.{field}': dynamic-length arrays and collections are not supported")]
    DynamicSequence {
        /// Record containing the field.
        record: String,
        /// Offending field.
        field: String,
    },
    /// A record contains itself, directly or transitively.
    #[error("record '{name}' contains itself")]
    RecursiveSchema {
        /// Name of the record that recurs.
        name: String,
    },
    /// Two different schemas were registered under the same name.
    #[error("conflicting definitions for record '{name}'")]
    SchemaConflict {
        /// The contested name.
        name: String,
    },
    /// A record declares the same field name twice.
    #[error("record '{record}' declares field '{field}' twice")]
    DuplicateField {
        /// Record containing the field.
        record: String,
        /// Duplicated field name.
        field: String,
    },
    /// The type cannot be the element type of a store.
    #[error("type '{name}' cannot be stored directly")]
    UnsupportedRoot {
        /// Name of the rejected type.
        name: String,
    },
    /// The serialized length does not fit in `usize`.
    #[error("layout of '{name}' overflows")]
    LayoutOverflow {
        /// Record whose layout overflowed.
        name: String,
    },
}

/// A [`Value`](crate::Value) that does not match the expected shape.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value variant differs from the expected type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type name.
        expected: String,
        /// Variant actually supplied.
        found: &'static str,
    },
    /// A record value has the wrong number of fields.
    #[error("record '{record}' expects {expected} fields, found {found}")]
    FieldCount {
        /// Record name.
        record: String,
        /// Declared field count.
        expected: usize,
        /// Supplied field count.
        found: usize,
    },
    /// A stored code point is not a valid `char`.
    #[error("invalid char code point {0:#x}")]
    InvalidChar(u32),
}

impl ValueError {
    /// Convenience constructor for [`ValueError::TypeMismatch`].
    pub fn mismatch(expected: impl Into<String>, found: &crate::Value) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.kind(),
        }
    }
}

/// Errors detected while validating or loading a
/// [`StoreConfig`](crate::StoreConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `size` is zero.
    #[error("store size must be positive")]
    ZeroSize,
    /// `dynamic_ratio` is outside `[0, 1)` or not finite.
    #[error("dynamic ratio {ratio} is outside [0, 1)")]
    InvalidDynamicRatio {
        /// The rejected ratio.
        ratio: f64,
    },
    /// The configured byte budget cannot hold a single slot.
    #[error("{size} bytes cannot hold a single {node_size}-byte slot")]
    ZeroCapacity {
        /// Configured size in bytes.
        size: u64,
        /// Size of one slot.
        node_size: usize,
    },
    /// Segment sizes overflow the address space.
    #[error("store of {capacity} slots of {node_size} bytes overflows")]
    SizeOverflow {
        /// Requested slot count.
        capacity: u64,
        /// Size of one slot.
        node_size: usize,
    },
    /// The configuration file could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration text is not valid TOML for a store config.
    #[error("invalid store config: {0}")]
    Parse(#[from] toml::de::Error),
}
