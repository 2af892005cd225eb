//! The [`Record`] trait: the bridge between Rust types and [`Value`].
//!
//! Implemented here for every primitive, `String`, `Option<T>` and the
//! standard sequence containers. Application record types implement it
//! by hand, usually with the help of [`FieldReader`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

use crate::error::ValueError;
use crate::schema::{CollectionType, ConcreteCollection, Primitive, Schema, TypeDesc};
use crate::value::Value;

/// A Rust type with a registration-time schema.
///
/// `to_value` and `from_value` must agree with `schema()`: record types
/// produce a [`Value::Record`] with one entry per declared field, in
/// declaration order.
pub trait Record: Sized {
    /// Shape descriptor of this type.
    fn schema() -> TypeDesc;

    /// Convert to the dynamic value model.
    fn to_value(&self) -> Value;

    /// Rebuild from the dynamic value model.
    fn from_value(value: Value) -> Result<Self, ValueError>;

    /// Overwrite `self` from a value, reusing its allocations where the
    /// implementation can.
    fn assign(&mut self, value: Value) -> Result<(), ValueError> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

macro_rules! impl_record_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Record for $ty {
                fn schema() -> TypeDesc {
                    TypeDesc::Primitive(Primitive::$variant)
                }

                fn to_value(&self) -> Value {
                    Value::$variant(*self)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(ValueError::mismatch(Primitive::$variant.name(), &other)),
                    }
                }
            }
        )*
    };
}

impl_record_scalar! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    f32 => F32,
    char => Char,
    i64 => I64,
    u64 => U64,
    f64 => F64,
}

impl Record for String {
    fn schema() -> TypeDesc {
        TypeDesc::Str
    }

    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(ValueError::mismatch("String", &other)),
        }
    }

    fn assign(&mut self, value: Value) -> Result<(), ValueError> {
        match value {
            Value::Str(s) => {
                self.clear();
                self.push_str(&s);
                Ok(())
            }
            other => Err(ValueError::mismatch("String", &other)),
        }
    }
}

impl<T: Record> Record for Option<T> {
    fn schema() -> TypeDesc {
        T::schema().nullable()
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Record::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn seq_items(value: Value, expected: &str) -> Result<Vec<Value>, ValueError> {
    match value {
        Value::Seq(items) => Ok(items),
        other => Err(ValueError::mismatch(expected, &other)),
    }
}

impl<T: Record> Record for Vec<T> {
    fn schema() -> TypeDesc {
        TypeDesc::collection(CollectionType::Concrete(ConcreteCollection::Vec), T::schema())
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Record::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        seq_items(value, "Vec")?.into_iter().map(T::from_value).collect()
    }
}

impl<T: Record> Record for VecDeque<T> {
    fn schema() -> TypeDesc {
        TypeDesc::collection(
            CollectionType::Concrete(ConcreteCollection::VecDeque),
            T::schema(),
        )
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Record::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        seq_items(value, "VecDeque")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<T: Record + Eq + Hash> Record for HashSet<T> {
    fn schema() -> TypeDesc {
        TypeDesc::collection(
            CollectionType::Concrete(ConcreteCollection::HashSet),
            T::schema(),
        )
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Record::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        seq_items(value, "HashSet")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

/// Element type of a map: a record of `key` and `value`.
fn entry_schema<K: Record, V: Record>() -> TypeDesc {
    let (key, value) = (K::schema(), V::schema());
    Schema::new(format!("Entry<{},{}>", key.name(), value.name()))
        .field("key", key)
        .field("value", value)
        .into_desc()
}

fn entry_value<K: Record, V: Record>((k, v): (&K, &V)) -> Value {
    Value::Record(vec![k.to_value(), v.to_value()])
}

fn read_entry<K: Record, V: Record>(entry: Value) -> Result<(K, V), ValueError> {
    let mut fields = FieldReader::new("Entry", entry, 2)?;
    Ok((fields.read()?, fields.read()?))
}

impl<T: Record + Ord> Record for BTreeSet<T> {
    fn schema() -> TypeDesc {
        TypeDesc::collection(
            CollectionType::Concrete(ConcreteCollection::BTreeSet),
            T::schema(),
        )
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Record::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        seq_items(value, "BTreeSet")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

impl<K: Record + Eq + Hash, V: Record> Record for HashMap<K, V> {
    fn schema() -> TypeDesc {
        TypeDesc::collection(
            CollectionType::Concrete(ConcreteCollection::HashMap),
            entry_schema::<K, V>(),
        )
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(entry_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        seq_items(value, "HashMap")?
            .into_iter()
            .map(read_entry)
            .collect()
    }
}

impl<K: Record + Ord, V: Record> Record for BTreeMap<K, V> {
    fn schema() -> TypeDesc {
        TypeDesc::collection(
            CollectionType::Concrete(ConcreteCollection::BTreeMap),
            entry_schema::<K, V>(),
        )
    }

    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(entry_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        seq_items(value, "BTreeMap")?
            .into_iter()
            .map(read_entry)
            .collect()
    }
}

/// Sequential reader over the fields of a [`Value::Record`].
///
/// ```
/// use stowage_core::{FieldReader, Value};
///
/// let value = Value::Record(vec![Value::I32(7), Value::Str("x".into())]);
/// let mut fields = FieldReader::new("Pair", value, 2).unwrap();
/// let n: i32 = fields.read().unwrap();
/// let s: String = fields.read().unwrap();
/// assert_eq!((n, s.as_str()), (7, "x"));
/// ```
pub struct FieldReader {
    fields: std::vec::IntoIter<Value>,
}

impl FieldReader {
    /// Check that `value` is a record with `expected` fields.
    pub fn new(record: &str, value: Value, expected: usize) -> Result<Self, ValueError> {
        match value {
            Value::Record(fields) if fields.len() == expected => Ok(Self {
                fields: fields.into_iter(),
            }),
            Value::Record(fields) => Err(ValueError::FieldCount {
                record: record.to_string(),
                expected,
                found: fields.len(),
            }),
            other => Err(ValueError::mismatch(record, &other)),
        }
    }

    /// Decode the next field.
    pub fn read<T: Record>(&mut self) -> Result<T, ValueError> {
        T::from_value(self.fields.next().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        assert_eq!(i64::from_value(42i64.to_value()), Ok(42));
        assert_eq!(char::from_value('λ'.to_value()), Ok('λ'));
        assert!(matches!(
            u8::from_value(Value::I8(1)),
            Err(ValueError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn option_maps_null() {
        assert_eq!(Option::<i32>::schema(), TypeDesc::Boxed(Primitive::I32));
        assert_eq!(Option::<i32>::from_value(Value::Null), Ok(None));
        assert_eq!(Some(5i32).to_value(), Value::I32(5));
        assert_eq!(Option::<String>::schema(), TypeDesc::Str);
    }

    #[test]
    fn string_assign_keeps_buffer() {
        let mut s = String::with_capacity(32);
        s.push_str("old");
        s.assign(Value::Str("new".into())).unwrap();
        assert_eq!(s, "new");
        assert!(s.capacity() >= 32);
    }

    #[test]
    fn vec_round_trip() {
        let v = vec![Some(1i32), None, Some(3)];
        let back = Vec::<Option<i32>>::from_value(v.to_value()).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn map_schema_uses_entry_records() {
        let TypeDesc::Collection(kind, element) = HashMap::<i32, String>::schema() else {
            panic!("expected collection");
        };
        assert_eq!(kind, CollectionType::Concrete(ConcreteCollection::HashMap));
        let TypeDesc::Record(entry) = *element else {
            panic!("expected record entry");
        };
        assert_eq!(entry.fields().len(), 2);
        assert_eq!(entry.name(), "Entry<i32,String>");
    }

    #[test]
    fn map_round_trip() {
        let mut m = HashMap::new();
        m.insert(1u32, "one".to_string());
        m.insert(2u32, "two".to_string());
        let back = HashMap::<u32, String>::from_value(m.to_value()).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn ordered_collections_keep_their_kind() {
        let TypeDesc::Collection(kind, _) = BTreeSet::<u8>::schema() else {
            panic!("expected collection");
        };
        assert_eq!(kind, CollectionType::Concrete(ConcreteCollection::BTreeSet));
        let TypeDesc::Collection(kind, element) = BTreeMap::<String, i64>::schema() else {
            panic!("expected collection");
        };
        assert_eq!(kind, CollectionType::Concrete(ConcreteCollection::BTreeMap));
        assert_eq!(element.name(), "Entry<String,i64>");
    }

    #[test]
    fn ordered_collections_round_trip() {
        let set: BTreeSet<i16> = [5, -2, 9].into_iter().collect();
        assert_eq!(
            set.to_value(),
            Value::Seq(vec![Value::I16(-2), Value::I16(5), Value::I16(9)])
        );
        assert_eq!(BTreeSet::<i16>::from_value(set.to_value()), Ok(set));

        let mut map = BTreeMap::new();
        map.insert("b".to_string(), 2i64);
        map.insert("a".to_string(), 1i64);
        let Value::Seq(entries) = map.to_value() else {
            panic!("expected sequence");
        };
        assert_eq!(
            entries[0],
            Value::Record(vec![Value::from("a"), Value::I64(1)])
        );
        assert_eq!(
            BTreeMap::<String, i64>::from_value(Value::Seq(entries)),
            Ok(map)
        );
        assert!(matches!(
            BTreeMap::<String, i64>::from_value(Value::I8(0)),
            Err(ValueError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn field_reader_checks_arity() {
        let err = FieldReader::new("P", Value::Record(vec![Value::Null]), 2).err();
        assert_eq!(
            err,
            Some(ValueError::FieldCount {
                record: "P".into(),
                expected: 2,
                found: 1
            })
        );
        assert!(FieldReader::new("P", Value::I8(0), 0).is_err());
    }
}
