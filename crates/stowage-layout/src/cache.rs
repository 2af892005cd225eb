//! Memoized layout computation.
//!
//! [`LayoutCache`] maps type names to computed layouts. Primitive and
//! nullable-primitive layouts are seeded at construction; record layouts
//! are computed on first request, recursively, and kept for the life of
//! the cache. Registering two different schemas under one name is an
//! error, as is a record that contains itself.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::Mutex;
use stowage_core::{FieldDef, Primitive, Schema, SchemaError, TypeDesc};
use tracing::{debug, warn};

use crate::layout::{
    ElementLayout, ElementShape, FieldKind, FieldLayout, Layout, LayoutShape, COUNT_WIDTH,
    NULL_FLAG, POINTER_WIDTH,
};

struct Entry {
    /// The schema a record layout was computed from; `None` for seeded
    /// and string layouts.
    schema: Option<Arc<Schema>>,
    layout: Arc<Layout>,
}

/// A name-keyed cache of computed layouts.
pub struct LayoutCache {
    entries: IndexMap<String, Entry>,
}

static GLOBAL: OnceLock<Mutex<LayoutCache>> = OnceLock::new();

/// Layout of `ty` from the process-wide cache.
pub fn layout_of(ty: &TypeDesc) -> Result<Arc<Layout>, SchemaError> {
    LayoutCache::global().lock().layout_of(ty)
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutCache {
    /// A cache seeded with every primitive and nullable-primitive layout.
    pub fn new() -> Self {
        let mut entries = IndexMap::with_capacity(2 * Primitive::ALL.len() + 1);
        for p in Primitive::ALL {
            for layout in [Layout::scalar(p), Layout::boxed(p)] {
                entries.insert(
                    layout.name.clone(),
                    Entry {
                        schema: None,
                        layout: Arc::new(layout),
                    },
                );
            }
        }
        let text = Layout::text();
        entries.insert(
            text.name.clone(),
            Entry {
                schema: None,
                layout: Arc::new(text),
            },
        );
        Self { entries }
    }

    /// The process-wide cache.
    pub fn global() -> &'static Mutex<LayoutCache> {
        GLOBAL.get_or_init(|| Mutex::new(LayoutCache::new()))
    }

    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty. Never true for a seeded cache.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A previously computed layout, by type name.
    pub fn get(&self, name: &str) -> Option<Arc<Layout>> {
        self.entries.get(name).map(|e| Arc::clone(&e.layout))
    }

    /// Cached type names, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Layout of a storable type. Idempotent.
    ///
    /// Primitives, nullable primitives, strings and records can be stored
    /// directly; arrays, collections and abstract types only as fields.
    pub fn layout_of(&mut self, ty: &TypeDesc) -> Result<Arc<Layout>, SchemaError> {
        match ty {
            TypeDesc::Primitive(_) | TypeDesc::Boxed(_) | TypeDesc::Str => {
                let name = ty.name();
                self.get(&name)
                    .ok_or(SchemaError::UnsupportedRoot { name })
            }
            TypeDesc::Record(schema) => self.record(schema, &mut Vec::new()),
            TypeDesc::Array(_) | TypeDesc::Collection(..) | TypeDesc::Interface(_) => {
                Err(SchemaError::UnsupportedRoot { name: ty.name() })
            }
        }
    }

    fn record(
        &mut self,
        schema: &Arc<Schema>,
        stack: &mut Vec<String>,
    ) -> Result<Arc<Layout>, SchemaError> {
        let name = schema.name();
        if let Some(entry) = self.entries.get(name) {
            let same = match &entry.schema {
                Some(known) => Arc::ptr_eq(known, schema) || **known == **schema,
                None => false,
            };
            return if same {
                Ok(Arc::clone(&entry.layout))
            } else {
                Err(SchemaError::SchemaConflict {
                    name: name.to_string(),
                })
            };
        }
        if stack.iter().any(|n| n == name) {
            return Err(SchemaError::RecursiveSchema {
                name: name.to_string(),
            });
        }

        stack.push(name.to_string());
        let computed = self.compute(schema, stack);
        stack.pop();
        let layout = Arc::new(computed?);

        debug!(
            name,
            length = layout.length,
            fields = layout.fields.len(),
            dynamic = layout.dynamic_offsets.len(),
            "layout computed"
        );
        self.entries.insert(
            name.to_string(),
            Entry {
                schema: Some(Arc::clone(schema)),
                layout: Arc::clone(&layout),
            },
        );
        Ok(layout)
    }

    fn compute(&mut self, schema: &Schema, stack: &mut Vec<String>) -> Result<Layout, SchemaError> {
        let record = schema.name();
        let defs = schema.fields();

        let mut seen = HashSet::with_capacity(defs.len());
        for def in defs {
            if !seen.insert(def.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    record: record.to_string(),
                    field: def.name.clone(),
                });
            }
        }

        let mut order: Vec<usize> = (0..defs.len()).collect();
        order.sort_by_key(|&i| defs[i].source_offset);

        let overflow = || SchemaError::LayoutOverflow {
            name: record.to_string(),
        };
        let mut fields = Vec::with_capacity(defs.len());
        let mut offset = 0usize;
        for value_index in order {
            let def = &defs[value_index];
            let (kind, payload, nullable) = self.field_kind(record, def, stack)?;
            let width = payload.checked_add(NULL_FLAG).ok_or_else(overflow)?;
            fields.push(FieldLayout {
                name: def.name.clone(),
                source_offset: def.source_offset,
                value_index,
                offset,
                width,
                nullable,
                kind,
            });
            offset = offset.checked_add(width).ok_or_else(overflow)?;
        }

        let dynamic_offsets = fields.iter().flat_map(FieldLayout::dynamic_offsets).collect();
        Ok(Layout {
            name: record.to_string(),
            length: offset,
            shape: LayoutShape::Record,
            fields,
            dynamic_offsets,
        })
    }

    /// Kind, payload width and nullability of one field.
    fn field_kind(
        &mut self,
        record: &str,
        def: &FieldDef,
        stack: &mut Vec<String>,
    ) -> Result<(FieldKind, usize, bool), SchemaError> {
        let overflow = || SchemaError::LayoutOverflow {
            name: record.to_string(),
        };
        let ignored_marker = |kind: &str| {
            if let Some(capacity) = def.fixed_len {
                warn!(
                    record,
                    field = %def.name,
                    capacity,
                    "fixed-length marker on {kind} field ignored"
                );
            }
        };

        match (&def.ty, def.fixed_len) {
            (TypeDesc::Primitive(p), _) => {
                ignored_marker("primitive");
                Ok((FieldKind::Primitive(*p), p.width(), false))
            }
            (TypeDesc::Boxed(p), _) => {
                ignored_marker("primitive");
                Ok((FieldKind::Primitive(*p), p.width(), true))
            }
            (TypeDesc::Str, Some(capacity)) => {
                let payload = (capacity as usize)
                    .checked_mul(2)
                    .and_then(|b| b.checked_add(COUNT_WIDTH))
                    .ok_or_else(overflow)?;
                Ok((FieldKind::FixedString { capacity }, payload, true))
            }
            (TypeDesc::Str, None) => Ok((FieldKind::DynamicString, POINTER_WIDTH, true)),
            (TypeDesc::Record(schema), _) => {
                ignored_marker("record");
                let layout = self.record(schema, stack)?;
                let length = layout.length;
                Ok((FieldKind::Record(layout), length, true))
            }
            (TypeDesc::Array(element), capacity) => {
                let element = self.element(record, &def.name, element, stack)?;
                let capacity = capacity.ok_or_else(|| SchemaError::DynamicSequence {
                    record: record.to_string(),
                    field: def.name.clone(),
                })?;
                let payload = sequence_payload(capacity, &element).ok_or_else(overflow)?;
                Ok((FieldKind::FixedArray { capacity, element }, payload, true))
            }
            (TypeDesc::Collection(declared, element), capacity) => {
                let collection =
                    declared
                        .resolve()
                        .ok_or_else(|| SchemaError::UnresolvableCollection {
                            record: record.to_string(),
                            field: def.name.clone(),
                            collection: declared.name(),
                        })?;
                if collection.is_map() {
                    let found = match element.as_ref() {
                        TypeDesc::Record(entry) => entry.fields().len(),
                        _ => 0,
                    };
                    if found != 2 {
                        return Err(SchemaError::MapEntryShape {
                            record: record.to_string(),
                            field: def.name.clone(),
                            found,
                        });
                    }
                }
                let element = self.element(record, &def.name, element, stack)?;
                let capacity = capacity.ok_or_else(|| SchemaError::DynamicSequence {
                    record: record.to_string(),
                    field: def.name.clone(),
                })?;
                let payload = sequence_payload(capacity, &element).ok_or_else(overflow)?;
                Ok((
                    FieldKind::FixedCollection {
                        capacity,
                        collection,
                        element,
                    },
                    payload,
                    true,
                ))
            }
            (TypeDesc::Interface(interface), _) => Err(SchemaError::InterfaceField {
                record: record.to_string(),
                field: def.name.clone(),
                interface: interface.clone(),
            }),
        }
    }

    fn element(
        &mut self,
        record: &str,
        field: &str,
        ty: &TypeDesc,
        stack: &mut Vec<String>,
    ) -> Result<ElementLayout, SchemaError> {
        let (nullable, payload, shape) = match ty {
            TypeDesc::Primitive(p) => (false, p.width(), ElementShape::Primitive(*p)),
            TypeDesc::Boxed(p) => (true, p.width(), ElementShape::Primitive(*p)),
            TypeDesc::Str => (true, POINTER_WIDTH, ElementShape::DynamicString),
            TypeDesc::Record(schema) => {
                let layout = self.record(schema, stack)?;
                (true, layout.length, ElementShape::Record(layout))
            }
            TypeDesc::Interface(interface) => {
                return Err(SchemaError::InterfaceElement {
                    record: record.to_string(),
                    field: field.to_string(),
                    interface: interface.clone(),
                })
            }
            TypeDesc::Array(_) | TypeDesc::Collection(..) => {
                return Err(SchemaError::NestedSequence {
                    record: record.to_string(),
                    field: field.to_string(),
                })
            }
        };
        let width = if nullable {
            payload.checked_add(NULL_FLAG).ok_or(SchemaError::LayoutOverflow {
                name: record.to_string(),
            })?
        } else {
            payload
        };
        Ok(ElementLayout {
            nullable,
            width,
            shape,
        })
    }
}

fn sequence_payload(capacity: u32, element: &ElementLayout) -> Option<usize> {
    (capacity as usize)
        .checked_mul(element.width)?
        .checked_add(COUNT_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::{CollectionType, ConcreteCollection};

    fn prim(p: Primitive) -> TypeDesc {
        TypeDesc::Primitive(p)
    }

    fn primitives_schema() -> Schema {
        Schema::new("Primitives")
            .field("bool", prim(Primitive::Bool))
            .field("b", prim(Primitive::I8))
            .field("c", prim(Primitive::Char))
            .field("d", prim(Primitive::F64))
            .field("f", prim(Primitive::F32))
            .field("i", prim(Primitive::I32))
            .field("l", prim(Primitive::I64))
            .field("s", prim(Primitive::I16))
    }

    fn fixed_schema() -> Schema {
        Schema::new("FixedLength")
            .fixed("fixed_string", TypeDesc::Str, 10)
            .fixed("fixed_ints", TypeDesc::array(prim(Primitive::I32)), 10)
            .fixed(
                "fixed_boxed",
                TypeDesc::array(TypeDesc::Boxed(Primitive::I32)),
                10,
            )
            .fixed(
                "fixed_list",
                TypeDesc::collection(CollectionType::List, TypeDesc::Boxed(Primitive::I32)),
                10,
            )
    }

    #[test]
    fn seeded_with_primitives_and_wrappers() {
        let cache = LayoutCache::new();
        assert_eq!(cache.len(), 25);
        assert_eq!(cache.get("f64").map(|l| l.length()), Some(8));
        assert_eq!(cache.get("Option<char>").map(|l| l.length()), Some(5));
        assert!(cache.get("String").is_some());
    }

    #[test]
    fn primitive_record_lengths() {
        let mut cache = LayoutCache::new();
        let layout = cache.layout_of(&primitives_schema().into_desc()).unwrap();
        // 1+1+4+8+4+4+8+2 payload bytes plus one null flag per field.
        assert_eq!(layout.length(), 32 + 8);
        let offsets: Vec<usize> = layout.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4, 9, 18, 23, 28, 37]);
        assert!(!layout.has_dynamic());
        assert!(layout.fields().iter().all(|f| !f.nullable));
    }

    #[test]
    fn fixed_length_record() {
        let mut cache = LayoutCache::new();
        let layout = cache.layout_of(&fixed_schema().into_desc()).unwrap();
        let widths: Vec<usize> = layout.fields().iter().map(|f| f.width).collect();
        assert_eq!(widths, vec![25, 45, 55, 55]);
        assert_eq!(layout.length(), 180);
        match &layout.field("fixed_list").unwrap().kind {
            FieldKind::FixedCollection {
                capacity,
                collection,
                element,
            } => {
                assert_eq!(*capacity, 10);
                assert_eq!(*collection, ConcreteCollection::Vec);
                assert!(element.nullable);
                assert_eq!(element.width, 5);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn nested_record_is_inlined() {
        let mut cache = LayoutCache::new();
        let outer = Schema::new("Generic")
            .field("integer", TypeDesc::Boxed(Primitive::I32))
            .field("primitives", primitives_schema().into_desc())
            .field("fixed", fixed_schema().into_desc());
        let layout = cache.layout_of(&outer.into_desc()).unwrap();
        assert_eq!(layout.length(), 5 + 41 + 181);
        assert!(cache.get("Primitives").is_some());
        assert!(cache.get("FixedLength").is_some());
        assert!(matches!(
            layout.field("primitives").map(|f| &f.kind),
            Some(FieldKind::Record(inner)) if inner.length() == 40
        ));
    }

    #[test]
    fn dynamic_offsets_cover_nested_pointers() {
        let mut cache = LayoutCache::new();
        let inner = Schema::new("Named")
            .field("id", prim(Primitive::U8))
            .field("name", TypeDesc::Str);
        let outer = Schema::new("Holder")
            .field("label", TypeDesc::Str)
            .field("inner", inner.into_desc());
        let layout = cache.layout_of(&outer.into_desc()).unwrap();
        // label pointer at 1; inner starts at 9 and its name pointer sits 3 bytes into it.
        assert_eq!(layout.dynamic_offsets(), &[1, 13]);
    }

    #[test]
    fn source_offsets_decide_order() {
        let mut cache = LayoutCache::new();
        let schema = Schema::new("Reordered")
            .field_def(FieldDef {
                name: "second".into(),
                source_offset: 20,
                ty: prim(Primitive::I64),
                fixed_len: None,
            })
            .field_def(FieldDef {
                name: "first".into(),
                source_offset: 10,
                ty: prim(Primitive::U8),
                fixed_len: None,
            });
        let layout = cache.layout_of(&schema.into_desc()).unwrap();
        assert_eq!(layout.fields()[0].name, "first");
        assert_eq!(layout.fields()[0].value_index, 1);
        assert_eq!(layout.fields()[1].offset, 2);
    }

    #[test]
    fn memoized_and_idempotent() {
        let mut cache = LayoutCache::new();
        let desc = primitives_schema().into_desc();
        let a = cache.layout_of(&desc).unwrap();
        let b = cache.layout_of(&primitives_schema().into_desc()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 26);
    }

    #[test]
    fn conflicting_schema_rejected() {
        let mut cache = LayoutCache::new();
        cache
            .layout_of(&Schema::new("P").field("x", prim(Primitive::I8)).into_desc())
            .unwrap();
        let err = cache
            .layout_of(&Schema::new("P").field("x", prim(Primitive::I16)).into_desc())
            .unwrap_err();
        assert_eq!(err, SchemaError::SchemaConflict { name: "P".into() });
        let err = cache
            .layout_of(&Schema::new("i32").into_desc())
            .unwrap_err();
        assert!(matches!(err, SchemaError::SchemaConflict { .. }));
    }

    #[test]
    fn recursion_rejected() {
        let mut cache = LayoutCache::new();
        let inner = Schema::new("Node").field("v", prim(Primitive::I32));
        let node = Schema::new("Node").field("next", inner.into_desc());
        assert_eq!(
            cache.layout_of(&node.into_desc()).unwrap_err(),
            SchemaError::RecursiveSchema {
                name: "Node".into()
            }
        );
        assert!(cache.get("Node").is_none());
    }

    #[test]
    fn unsupported_shapes_rejected() {
        let mut cache = LayoutCache::new();
        let cases = [
            (
                Schema::new("A").field("x", TypeDesc::Interface("Shape".into())),
                "interface field",
            ),
            (
                Schema::new("B").fixed(
                    "xs",
                    TypeDesc::array(TypeDesc::Interface("Shape".into())),
                    4,
                ),
                "interface element",
            ),
            (
                Schema::new("C").field("xs", TypeDesc::array(prim(Primitive::I32))),
                "dynamic array",
            ),
            (
                Schema::new("D").field(
                    "xs",
                    TypeDesc::collection(CollectionType::List, prim(Primitive::I32)),
                ),
                "dynamic collection",
            ),
            (
                Schema::new("E").fixed(
                    "xs",
                    TypeDesc::collection(
                        CollectionType::Interface("Bag".into()),
                        prim(Primitive::I32),
                    ),
                    4,
                ),
                "abstract collection",
            ),
            (
                Schema::new("F").fixed(
                    "xs",
                    TypeDesc::array(TypeDesc::array(prim(Primitive::I32))),
                    4,
                ),
                "nested sequence",
            ),
            (
                Schema::new("G").fixed(
                    "m",
                    TypeDesc::collection(CollectionType::Map, prim(Primitive::I32)),
                    4,
                ),
                "map without entries",
            ),
            (
                Schema::new("H")
                    .field("x", prim(Primitive::I32))
                    .field("x", prim(Primitive::I64)),
                "duplicate field",
            ),
        ];
        for (schema, what) in cases {
            let name = schema.name().to_string();
            assert!(cache.layout_of(&schema.into_desc()).is_err(), "{what} accepted");
            assert!(cache.get(&name).is_none(), "{what} cached");
        }
    }

    #[test]
    fn error_kinds() {
        let mut cache = LayoutCache::new();
        let err = cache
            .layout_of(
                &Schema::new("C")
                    .field("xs", TypeDesc::array(prim(Primitive::I32)))
                    .into_desc(),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::DynamicSequence { .. }));
        let err = cache
            .layout_of(
                &Schema::new("E")
                    .fixed(
                        "xs",
                        TypeDesc::collection(
                            CollectionType::Interface("Bag".into()),
                            prim(Primitive::I32),
                        ),
                        4,
                    )
                    .into_desc(),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvableCollection { .. }));
        assert!(matches!(
            cache.layout_of(&TypeDesc::array(prim(Primitive::I8))),
            Err(SchemaError::UnsupportedRoot { .. })
        ));
    }

    #[test]
    fn map_with_entry_records() {
        let mut cache = LayoutCache::new();
        let entry = Schema::new("Entry<u32,String>")
            .field("key", prim(Primitive::U32))
            .field("value", TypeDesc::Str);
        let schema = Schema::new("Dict").fixed(
            "m",
            TypeDesc::collection(CollectionType::Map, entry.into_desc()),
            2,
        );
        let layout = cache.layout_of(&schema.into_desc()).unwrap();
        // entry = 5 + 9 = 14, element = 15, field = 1 + 4 + 30.
        assert_eq!(layout.length(), 35);
        // element i at 5 + 15i, value field pointer at +1 (flag) +5 +1.
        assert_eq!(layout.dynamic_offsets(), &[12, 27]);
    }

    #[test]
    fn zero_capacity_sequence() {
        let mut cache = LayoutCache::new();
        let schema = Schema::new("Empty").fixed("xs", TypeDesc::array(prim(Primitive::I64)), 0);
        let layout = cache.layout_of(&schema.into_desc()).unwrap();
        assert_eq!(layout.length(), 5);
    }

    #[test]
    fn global_cache_is_shared() {
        let desc = Schema::new("GlobalProbe")
            .field("x", prim(Primitive::U64))
            .into_desc();
        let a = layout_of(&desc).unwrap();
        let b = layout_of(&desc).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(LayoutCache::global().lock().get("GlobalProbe").is_some());
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn any_primitive() -> impl Strategy<Value = Primitive> {
            prop::sample::select(Primitive::ALL.to_vec())
        }

        proptest! {
            #[test]
            fn offsets_are_contiguous(prims in prop::collection::vec((any_primitive(), any::<bool>()), 0..24)) {
                let mut schema = Schema::new("Contiguous");
                for (i, (p, boxed)) in prims.iter().enumerate() {
                    let ty = if *boxed { TypeDesc::Boxed(*p) } else { TypeDesc::Primitive(*p) };
                    schema = schema.field(format!("f{i}"), ty);
                }
                let layout = LayoutCache::new().layout_of(&schema.into_desc()).unwrap();
                let mut expected = 0;
                for f in layout.fields() {
                    prop_assert_eq!(f.offset, expected);
                    expected += f.width;
                }
                prop_assert_eq!(layout.length(), expected);
                let payload: usize = prims.iter().map(|(p, _)| p.width() + 1).sum();
                prop_assert_eq!(layout.length(), payload);
            }

            #[test]
            fn order_independent_of_declaration(
                prims in prop::collection::vec(any_primitive(), 1..12),
                seed in any::<u64>(),
            ) {
                let defs: Vec<FieldDef> = prims
                    .iter()
                    .enumerate()
                    .map(|(i, p)| FieldDef {
                        name: format!("f{i}"),
                        source_offset: i as u32,
                        ty: TypeDesc::Primitive(*p),
                        fixed_len: None,
                    })
                    .collect();
                let mut shuffled = defs.clone();
                let n = shuffled.len();
                for i in 0..n {
                    let j = (seed.rotate_left(i as u32) as usize) % n;
                    shuffled.swap(i, j);
                }
                let build = |defs: Vec<FieldDef>| {
                    defs.into_iter()
                        .fold(Schema::new("Shuffled"), Schema::field_def)
                        .into_desc()
                };
                let a = LayoutCache::new().layout_of(&build(defs)).unwrap();
                let b = LayoutCache::new().layout_of(&build(shuffled)).unwrap();
                let names = |l: &Layout| l.fields().iter().map(|f| (f.name.clone(), f.offset)).collect::<Vec<_>>();
                prop_assert_eq!(names(&a), names(&b));
            }
        }
    }
}
