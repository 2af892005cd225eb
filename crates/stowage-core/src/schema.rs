//! Registration-time schema descriptors.
//!
//! A [`TypeDesc`] describes the shape of a storable type: a primitive, a
//! nullable primitive, a string, a nested record, or a sequence of any of
//! these. Records are described by a [`Schema`], an explicit field list
//! built once and validated by the layout engine.

use std::fmt;
use std::sync::Arc;

/// Fixed-width scalar kinds, stored little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `bool`, one byte (`0` or `1`).
    Bool,
    /// `i8`.
    I8,
    /// `u8`.
    U8,
    /// `i16`.
    I16,
    /// `u16`.
    U16,
    /// `i32`.
    I32,
    /// `u32`.
    U32,
    /// `f32`.
    F32,
    /// `char`, stored as its 4-byte Unicode scalar value.
    Char,
    /// `i64`.
    I64,
    /// `u64`.
    U64,
    /// `f64`.
    F64,
}

impl Primitive {
    /// Every primitive kind, in declaration order.
    pub const ALL: [Primitive; 12] = [
        Primitive::Bool,
        Primitive::I8,
        Primitive::U8,
        Primitive::I16,
        Primitive::U16,
        Primitive::I32,
        Primitive::U32,
        Primitive::F32,
        Primitive::Char,
        Primitive::I64,
        Primitive::U64,
        Primitive::F64,
    ];

    /// Serialized width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 | Self::Char => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// The Rust spelling of this primitive.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::Char => "char",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Concrete collection implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConcreteCollection {
    /// `Vec<T>`.
    Vec,
    /// `VecDeque<T>`.
    VecDeque,
    /// `HashSet<T>`.
    HashSet,
    /// `BTreeSet<T>`.
    BTreeSet,
    /// `HashMap<K, V>`, elements are entry records.
    HashMap,
    /// `BTreeMap<K, V>`, elements are entry records.
    BTreeMap,
}

impl ConcreteCollection {
    /// Whether elements are key/value entries.
    pub const fn is_map(self) -> bool {
        matches!(self, Self::HashMap | Self::BTreeMap)
    }

    /// Type name without generic parameters.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vec => "Vec",
            Self::VecDeque => "VecDeque",
            Self::HashSet => "HashSet",
            Self::BTreeSet => "BTreeSet",
            Self::HashMap => "HashMap",
            Self::BTreeMap => "BTreeMap",
        }
    }
}

/// A declared collection type, possibly abstract.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CollectionType {
    /// Abstract ordered list; resolves to [`ConcreteCollection::Vec`].
    List,
    /// Abstract set; resolves to [`ConcreteCollection::HashSet`].
    Set,
    /// Abstract map; resolves to [`ConcreteCollection::HashMap`].
    Map,
    /// A concrete implementation.
    Concrete(ConcreteCollection),
    /// Any other abstract collection. Never resolvable.
    Interface(String),
}

impl CollectionType {
    /// Resolve to the concrete implementation used for decoding.
    pub fn resolve(&self) -> Option<ConcreteCollection> {
        match self {
            Self::List => Some(ConcreteCollection::Vec),
            Self::Set => Some(ConcreteCollection::HashSet),
            Self::Map => Some(ConcreteCollection::HashMap),
            Self::Concrete(c) => Some(*c),
            Self::Interface(_) => None,
        }
    }

    /// Declared type name.
    pub fn name(&self) -> String {
        match self {
            Self::List => "List".to_string(),
            Self::Set => "Set".to_string(),
            Self::Map => "Map".to_string(),
            Self::Concrete(c) => c.name().to_string(),
            Self::Interface(name) => format!("dyn {name}"),
        }
    }
}

/// Shape of a storable type.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDesc {
    /// A non-nullable primitive.
    Primitive(Primitive),
    /// A nullable primitive (`Option<p>`).
    Boxed(Primitive),
    /// A UTF-8 string; dynamic unless a field marks a fixed capacity.
    Str,
    /// A nested record, inlined into its parent.
    Record(Arc<Schema>),
    /// An array of elements; requires a fixed capacity.
    Array(Box<TypeDesc>),
    /// A collection of elements; requires a fixed capacity.
    Collection(CollectionType, Box<TypeDesc>),
    /// An abstract type. Never storable.
    Interface(String),
}

impl TypeDesc {
    /// Shorthand for [`TypeDesc::Array`].
    pub fn array(element: TypeDesc) -> Self {
        Self::Array(Box::new(element))
    }

    /// Shorthand for [`TypeDesc::Collection`].
    pub fn collection(kind: CollectionType, element: TypeDesc) -> Self {
        Self::Collection(kind, Box::new(element))
    }

    /// Shorthand for [`TypeDesc::Record`].
    pub fn record(schema: Schema) -> Self {
        Self::Record(Arc::new(schema))
    }

    /// The nullable counterpart of this type. Primitives become boxed;
    /// every other kind already admits null.
    pub fn nullable(self) -> Self {
        match self {
            Self::Primitive(p) => Self::Boxed(p),
            other => other,
        }
    }

    /// Whether a stored instance can be absent.
    pub fn is_nullable(&self) -> bool {
        !matches!(self, Self::Primitive(_))
    }

    /// Stable name used as the layout cache key.
    pub fn name(&self) -> String {
        match self {
            Self::Primitive(p) => p.name().to_string(),
            Self::Boxed(p) => format!("Option<{p}>"),
            Self::Str => "String".to_string(),
            Self::Record(schema) => schema.name().to_string(),
            Self::Array(element) => format!("[{}]", element.name()),
            Self::Collection(kind, element) => format!("{}<{}>", kind.name(), element.name()),
            Self::Interface(name) => format!("dyn {name}"),
        }
    }
}

/// One declared field of a record.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// Field name, unique within its record.
    pub name: String,
    /// Declaration-order key used to sort fields before offsets are
    /// assigned. Ties keep declaration order.
    pub source_offset: u32,
    /// Field type.
    pub ty: TypeDesc,
    /// Fixed element capacity for strings, arrays and collections.
    /// `None` means dynamic length.
    pub fixed_len: Option<u32>,
}

/// An explicit, named field list describing a record type.
///
/// ```
/// use stowage_core::{Primitive, Schema, TypeDesc};
///
/// let point = Schema::new("Point")
///     .field("x", TypeDesc::Primitive(Primitive::F64))
///     .field("y", TypeDesc::Primitive(Primitive::F64))
///     .fixed("label", TypeDesc::Str, 16);
/// assert_eq!(point.fields().len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Start an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    fn next_offset(&self) -> u32 {
        self.fields
            .iter()
            .map(|f| f.source_offset.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Append a field with no capacity marker.
    pub fn field(mut self, name: impl Into<String>, ty: TypeDesc) -> Self {
        let source_offset = self.next_offset();
        self.fields.push(FieldDef {
            name: name.into(),
            source_offset,
            ty,
            fixed_len: None,
        });
        self
    }

    /// Append a field with a fixed element capacity.
    pub fn fixed(mut self, name: impl Into<String>, ty: TypeDesc, capacity: u32) -> Self {
        let source_offset = self.next_offset();
        self.fields.push(FieldDef {
            name: name.into(),
            source_offset,
            ty,
            fixed_len: Some(capacity),
        });
        self
    }

    /// Append a fully specified field, including its source offset.
    pub fn field_def(mut self, def: FieldDef) -> Self {
        self.fields.push(def);
        self
    }

    /// Record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Declaration index of the named field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Wrap into a [`TypeDesc::Record`].
    pub fn into_desc(self) -> TypeDesc {
        TypeDesc::record(self)
    }
}
