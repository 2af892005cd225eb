//! The dynamic value model exchanged with the store codec.

use crate::schema::Primitive;

/// A live value in the shape described by a [`TypeDesc`](crate::TypeDesc).
///
/// Records carry their fields in declaration order; arrays and
/// collections are both represented as [`Value::Seq`].
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// An absent value.
    #[default]
    Null,
    /// `bool`.
    Bool(bool),
    /// `i8`.
    I8(i8),
    /// `u8`.
    U8(u8),
    /// `i16`.
    I16(i16),
    /// `u16`.
    U16(u16),
    /// `i32`.
    I32(i32),
    /// `u32`.
    U32(u32),
    /// `f32`.
    F32(f32),
    /// `char`.
    Char(char),
    /// `i64`.
    I64(i64),
    /// `u64`.
    U64(u64),
    /// `f64`.
    F64(f64),
    /// A string.
    Str(String),
    /// Elements of an array or collection.
    Seq(Vec<Value>),
    /// Fields of a record, in declaration order.
    Record(Vec<Value>),
}

impl Value {
    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::F32(_) => "f32",
            Self::Char(_) => "char",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::Str(_) => "string",
            Self::Seq(_) => "sequence",
            Self::Record(_) => "record",
        }
    }

    /// The primitive kind of a scalar variant.
    pub fn primitive(&self) -> Option<Primitive> {
        Some(match self {
            Self::Bool(_) => Primitive::Bool,
            Self::I8(_) => Primitive::I8,
            Self::U8(_) => Primitive::U8,
            Self::I16(_) => Primitive::I16,
            Self::U16(_) => Primitive::U16,
            Self::I32(_) => Primitive::I32,
            Self::U32(_) => Primitive::U32,
            Self::F32(_) => Primitive::F32,
            Self::Char(_) => Primitive::Char,
            Self::I64(_) => Primitive::I64,
            Self::U64(_) => Primitive::U64,
            Self::F64(_) => Primitive::F64,
            _ => return None,
        })
    }

    /// The zero value of a primitive kind.
    pub fn zero(primitive: Primitive) -> Self {
        match primitive {
            Primitive::Bool => Self::Bool(false),
            Primitive::I8 => Self::I8(0),
            Primitive::U8 => Self::U8(0),
            Primitive::I16 => Self::I16(0),
            Primitive::U16 => Self::U16(0),
            Primitive::I32 => Self::I32(0),
            Primitive::U32 => Self::U32(0),
            Primitive::F32 => Self::F32(0.0),
            Primitive::Char => Self::Char('\0'),
            Primitive::I64 => Self::I64(0),
            Primitive::U64 => Self::U64(0),
            Primitive::F64 => Self::F64(0.0),
        }
    }

    /// Take the string buffer out of a [`Value::Str`], leaving it empty,
    /// or return a fresh one. Used by decoders to reuse allocations.
    pub fn take_string(&mut self) -> String {
        match self {
            Self::Str(s) => {
                let mut s = std::mem::take(s);
                s.clear();
                s
            }
            _ => String::new(),
        }
    }

    /// Take the element buffer out of a [`Value::Seq`] or
    /// [`Value::Record`] without clearing it.
    pub fn take_items(&mut self) -> Vec<Value> {
        match self {
            Self::Seq(items) | Self::Record(items) => std::mem::take(items),
            _ => Vec::new(),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
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
    String => Str,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_null() {
        assert!(Value::default().is_null());
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3u16)), Value::U16(3));
    }

    #[test]
    fn zero_matches_primitive() {
        for p in Primitive::ALL {
            assert_eq!(Value::zero(p).primitive(), Some(p));
        }
        assert_eq!(Value::Str(String::new()).primitive(), None);
    }

    #[test]
    fn take_string_reuses_buffer() {
        let mut v = Value::Str(String::with_capacity(64));
        let s = v.take_string();
        assert!(s.is_empty());
        assert!(s.capacity() >= 64);
        assert_eq!(Value::Null.take_string(), "");
    }

    #[test]
    fn take_items_from_record_and_seq() {
        let mut rec = Value::Record(vec![Value::I32(1), Value::Null]);
        assert_eq!(rec.take_items().len(), 2);
        assert_eq!(rec, Value::Record(Vec::new()));
        assert!(Value::I8(1).take_items().is_empty());
    }
}
