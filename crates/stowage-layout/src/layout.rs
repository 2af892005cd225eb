//! Computed layouts and their field descriptors.

use std::sync::Arc;

use stowage_core::{ConcreteCollection, Primitive};

/// Width of the per-field (and per-nullable-element) null flag.
pub const NULL_FLAG: usize = 1;

/// Width of the stored length of fixed strings and count of fixed
/// sequences.
pub const COUNT_WIDTH: usize = 4;

/// Width of a dynamic block address.
pub const POINTER_WIDTH: usize = 8;

/// Stored length marking an absent fixed string.
pub const ABSENT_LENGTH: i32 = -1;

/// How the root value of a layout maps onto its bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutShape {
    /// A bare primitive; no fields, no null flag.
    Scalar(Primitive),
    /// A nullable primitive stored as a single field named `value`.
    Boxed(Primitive),
    /// A string stored as a single dynamic-string field named `value`.
    Text,
    /// A record; the value is a [`Value::Record`](stowage_core::Value).
    Record,
}

/// Shape of one array or collection element.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementShape {
    /// A primitive value.
    Primitive(Primitive),
    /// A dynamic string (`u64` block address).
    DynamicString,
    /// An inlined record.
    Record(Arc<Layout>),
}

/// Layout of one element of a fixed array or collection.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementLayout {
    /// Whether the element starts with its own null flag.
    pub nullable: bool,
    /// Total width, including the null flag if present.
    pub width: usize,
    /// Element payload shape.
    pub shape: ElementShape,
}

impl ElementLayout {
    /// Offset of the payload within the element.
    pub fn payload_offset(&self) -> usize {
        if self.nullable {
            NULL_FLAG
        } else {
            0
        }
    }

    fn dynamic_offsets(&self) -> Vec<usize> {
        let base = self.payload_offset();
        match &self.shape {
            ElementShape::Primitive(_) => Vec::new(),
            ElementShape::DynamicString => vec![base],
            ElementShape::Record(layout) => {
                layout.dynamic_offsets.iter().map(|d| base + d).collect()
            }
        }
    }
}

/// Kind of a field together with its kind-specific parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// A primitive value.
    Primitive(Primitive),
    /// A string of at most `capacity` UTF-16 code units, stored inline.
    FixedString {
        /// Capacity in UTF-16 code units.
        capacity: u32,
    },
    /// An array of at most `capacity` elements, stored inline.
    FixedArray {
        /// Element capacity.
        capacity: u32,
        /// Element layout.
        element: ElementLayout,
    },
    /// A collection of at most `capacity` elements, stored inline.
    FixedCollection {
        /// Element capacity.
        capacity: u32,
        /// Concrete implementation used on decode.
        collection: ConcreteCollection,
        /// Element layout.
        element: ElementLayout,
    },
    /// A string stored in the dynamic segment.
    DynamicString,
    /// A nested record, inlined.
    Record(Arc<Layout>),
}

impl FieldKind {
    /// Short kind name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::FixedString { .. } => "fixed string",
            Self::FixedArray { .. } => "fixed array",
            Self::FixedCollection { .. } => "fixed collection",
            Self::DynamicString => "dynamic string",
            Self::Record(_) => "record",
        }
    }
}

/// Descriptor of one serialized field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldLayout {
    /// Field name.
    pub name: String,
    /// Declared source offset, the sort key.
    pub source_offset: u32,
    /// Position of the field in the record value (declaration order).
    pub value_index: usize,
    /// Serialized offset of the null flag within the enclosing layout.
    pub offset: usize,
    /// Total width including the null flag.
    pub width: usize,
    /// Whether the field can hold null.
    pub nullable: bool,
    /// Kind and parameters.
    pub kind: FieldKind,
}

impl FieldLayout {
    /// Serialized offset of the payload (just past the null flag).
    pub fn payload_offset(&self) -> usize {
        self.offset + NULL_FLAG
    }

    pub(crate) fn dynamic_offsets(&self) -> Vec<usize> {
        let base = self.payload_offset();
        match &self.kind {
            FieldKind::Primitive(_) | FieldKind::FixedString { .. } => Vec::new(),
            FieldKind::DynamicString => vec![base],
            FieldKind::Record(layout) => layout.dynamic_offsets.iter().map(|d| base + d).collect(),
            FieldKind::FixedArray { capacity, element }
            | FieldKind::FixedCollection {
                capacity, element, ..
            } => {
                let inner = element.dynamic_offsets();
                if inner.is_empty() {
                    return Vec::new();
                }
                let first = base + COUNT_WIDTH;
                (0..*capacity as usize)
                    .flat_map(|i| {
                        let at = first + i * element.width;
                        inner.iter().map(move |d| at + d)
                    })
                    .collect()
            }
        }
    }
}

/// The binary shape of one stored type.
///
/// Immutable once computed. Fields are ordered by source offset and laid
/// out back to back; `length` is the sum of their widths.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    pub(crate) name: String,
    pub(crate) length: usize,
    pub(crate) shape: LayoutShape,
    pub(crate) fields: Vec<FieldLayout>,
    pub(crate) dynamic_offsets: Vec<usize>,
}

impl Layout {
    pub(crate) fn scalar(primitive: Primitive) -> Self {
        Self {
            name: primitive.name().to_string(),
            length: primitive.width(),
            shape: LayoutShape::Scalar(primitive),
            fields: Vec::new(),
            dynamic_offsets: Vec::new(),
        }
    }

    fn single(name: String, shape: LayoutShape, kind: FieldKind, payload: usize) -> Self {
        let field = FieldLayout {
            name: "value".to_string(),
            source_offset: 0,
            value_index: 0,
            offset: 0,
            width: NULL_FLAG + payload,
            nullable: true,
            kind,
        };
        let dynamic_offsets = field.dynamic_offsets();
        Self {
            name,
            length: field.width,
            shape,
            fields: vec![field],
            dynamic_offsets,
        }
    }

    pub(crate) fn boxed(primitive: Primitive) -> Self {
        Self::single(
            format!("Option<{primitive}>"),
            LayoutShape::Boxed(primitive),
            FieldKind::Primitive(primitive),
            primitive.width(),
        )
    }

    pub(crate) fn text() -> Self {
        Self::single(
            "String".to_string(),
            LayoutShape::Text,
            FieldKind::DynamicString,
            POINTER_WIDTH,
        )
    }

    /// Type name this layout was computed for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total serialized length in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    /// How the root value maps onto the bytes.
    pub fn shape(&self) -> LayoutShape {
        self.shape
    }

    /// Fields in serialized order.
    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    /// Number of fields in the record value.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Offsets, relative to the start of the layout, of every dynamic
    /// block address the layout contains. Ascending.
    pub fn dynamic_offsets(&self) -> &[usize] {
        &self.dynamic_offsets
    }

    /// Whether any part of the layout lives in the dynamic segment.
    pub fn has_dynamic(&self) -> bool {
        !self.dynamic_offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_layout_has_no_fields() {
        let l = Layout::scalar(Primitive::I64);
        assert_eq!(l.length(), 8);
        assert!(l.fields().is_empty());
        assert_eq!(l.shape(), LayoutShape::Scalar(Primitive::I64));
    }

    #[test]
    fn boxed_layout_carries_flag() {
        let l = Layout::boxed(Primitive::U16);
        assert_eq!(l.name(), "Option<u16>");
        assert_eq!(l.length(), 3);
        assert_eq!(l.field("value").map(|f| f.payload_offset()), Some(1));
        assert!(!l.has_dynamic());
    }

    #[test]
    fn text_layout_points_into_dynamic_segment() {
        let l = Layout::text();
        assert_eq!(l.length(), 9);
        assert_eq!(l.dynamic_offsets(), &[1]);
    }

    #[test]
    fn element_payload_offsets() {
        let plain = ElementLayout {
            nullable: false,
            width: 4,
            shape: ElementShape::Primitive(Primitive::I32),
        };
        let flagged = ElementLayout {
            nullable: true,
            width: 9,
            shape: ElementShape::DynamicString,
        };
        assert_eq!(plain.payload_offset(), 0);
        assert_eq!(flagged.payload_offset(), 1);
        assert_eq!(flagged.dynamic_offsets(), vec![1]);
    }

    #[test]
    fn array_of_strings_lists_every_pointer() {
        let field = FieldLayout {
            name: "tags".into(),
            source_offset: 0,
            value_index: 0,
            offset: 10,
            width: 1 + 4 + 3 * 9,
            nullable: true,
            kind: FieldKind::FixedArray {
                capacity: 3,
                element: ElementLayout {
                    nullable: true,
                    width: 9,
                    shape: ElementShape::DynamicString,
                },
            },
        };
        // payload at 11, first element at 15, pointer after each flag.
        assert_eq!(field.dynamic_offsets(), vec![16, 25, 34]);
    }
}
