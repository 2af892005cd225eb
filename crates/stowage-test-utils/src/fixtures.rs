//! Standard record fixtures.
//!
//! - [`PrimitiveRecord`]: one field of each common primitive.
//! - [`FixedLengthRecord`]: fixed-capacity string, arrays and list.
//! - [`DynamicRecord`]: a single dynamic string.
//! - [`GenericRecord`]: a boxed integer and two nested records.

use rand::distributions::Alphanumeric;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use stowage_core::{
    CollectionType, FieldReader, Primitive, Record, Schema, TypeDesc, Value, ValueError,
};

/// Capacity of every fixed field of [`FixedLengthRecord`].
pub const FIXED_CAPACITY: u32 = 10;

fn text(rng: &mut ChaCha8Rng, min: usize, max: usize) -> String {
    let len = rng.gen_range(min..=max);
    (0..len).map(|_| rng.sample(Alphanumeric) as char).collect()
}

fn seq<T: Record>(items: &[T]) -> Value {
    Value::Seq(items.iter().map(Record::to_value).collect())
}

// ── PrimitiveRecord ─────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Default)]
pub struct PrimitiveRecord {
    pub flag: bool,
    pub byte: i8,
    pub letter: char,
    pub double: f64,
    pub float: f32,
    pub int: i32,
    pub long: i64,
    pub short: i16,
}

impl PrimitiveRecord {
    pub const NAME: &'static str = "fixtures::PrimitiveRecord";

    pub fn random(rng: &mut ChaCha8Rng) -> Self {
        Self {
            flag: rng.gen(),
            byte: rng.gen(),
            letter: rng.gen(),
            double: rng.gen(),
            float: rng.gen(),
            int: rng.gen(),
            long: rng.gen(),
            short: rng.gen(),
        }
    }

    pub fn schema_def() -> Schema {
        let p = TypeDesc::Primitive;
        Schema::new(Self::NAME)
            .field("flag", p(Primitive::Bool))
            .field("byte", p(Primitive::I8))
            .field("letter", p(Primitive::Char))
            .field("double", p(Primitive::F64))
            .field("float", p(Primitive::F32))
            .field("int", p(Primitive::I32))
            .field("long", p(Primitive::I64))
            .field("short", p(Primitive::I16))
    }
}

impl Record for PrimitiveRecord {
    fn schema() -> TypeDesc {
        Self::schema_def().into_desc()
    }

    fn to_value(&self) -> Value {
        Value::Record(vec![
            self.flag.into(),
            self.byte.into(),
            self.letter.into(),
            self.double.into(),
            self.float.into(),
            self.int.into(),
            self.long.into(),
            self.short.into(),
        ])
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        let mut f = FieldReader::new(Self::NAME, value, 8)?;
        Ok(Self {
            flag: f.read()?,
            byte: f.read()?,
            letter: f.read()?,
            double: f.read()?,
            float: f.read()?,
            int: f.read()?,
            long: f.read()?,
            short: f.read()?,
        })
    }
}

// ── FixedLengthRecord ───────────────────────────────────────────────

/// Every field is stored inline with capacity [`FIXED_CAPACITY`]; 180
/// bytes in total.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FixedLengthRecord {
    pub text: Option<String>,
    pub ints: Vec<i32>,
    pub boxed: Vec<Option<i32>>,
    pub list: Vec<Option<i32>>,
}

impl FixedLengthRecord {
    pub const NAME: &'static str = "fixtures::FixedLengthRecord";

    /// Random contents that fit their capacities exactly or below.
    pub fn random(rng: &mut ChaCha8Rng) -> Self {
        let cap = FIXED_CAPACITY as usize;
        let maybe = |rng: &mut ChaCha8Rng| rng.gen_bool(0.8).then(|| rng.gen::<i32>());
        Self {
            text: rng
                .gen_bool(0.9)
                .then(|| text(rng, 0, cap)),
            ints: (0..rng.gen_range(0..=cap)).map(|_| rng.gen()).collect(),
            boxed: (0..rng.gen_range(0..=cap)).map(|_| maybe(rng)).collect(),
            list: (0..rng.gen_range(0..=cap)).map(|_| maybe(rng)).collect(),
        }
    }

    pub fn schema_def() -> Schema {
        let boxed = || TypeDesc::Boxed(Primitive::I32);
        Schema::new(Self::NAME)
            .fixed("text", TypeDesc::Str, FIXED_CAPACITY)
            .fixed(
                "ints",
                TypeDesc::array(TypeDesc::Primitive(Primitive::I32)),
                FIXED_CAPACITY,
            )
            .fixed("boxed", TypeDesc::array(boxed()), FIXED_CAPACITY)
            .fixed(
                "list",
                TypeDesc::collection(CollectionType::List, boxed()),
                FIXED_CAPACITY,
            )
    }
}

impl Record for FixedLengthRecord {
    fn schema() -> TypeDesc {
        Self::schema_def().into_desc()
    }

    fn to_value(&self) -> Value {
        Value::Record(vec![
            self.text.clone().into(),
            seq(&self.ints),
            seq(&self.boxed),
            seq(&self.list),
        ])
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        let mut f = FieldReader::new(Self::NAME, value, 4)?;
        Ok(Self {
            text: f.read()?,
            ints: f.read()?,
            boxed: f.read()?,
            list: f.read()?,
        })
    }
}

// ── DynamicRecord ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Default)]
pub struct DynamicRecord {
    pub text: String,
}

impl DynamicRecord {
    pub const NAME: &'static str = "fixtures::DynamicRecord";

    /// An 8 to 15 character alphanumeric string.
    pub fn random(rng: &mut ChaCha8Rng) -> Self {
        Self {
            text: text(rng, 8, 15),
        }
    }
}

impl Record for DynamicRecord {
    fn schema() -> TypeDesc {
        Schema::new(Self::NAME)
            .field("text", TypeDesc::Str)
            .into_desc()
    }

    fn to_value(&self) -> Value {
        Value::Record(vec![self.text.as_str().into()])
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        let mut f = FieldReader::new(Self::NAME, value, 1)?;
        Ok(Self { text: f.read()? })
    }
}

// ── GenericRecord ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Default)]
pub struct GenericRecord {
    pub number: Option<i32>,
    pub primitives: Option<PrimitiveRecord>,
    pub fixed: Option<FixedLengthRecord>,
}

impl GenericRecord {
    pub const NAME: &'static str = "fixtures::GenericRecord";

    pub fn random(rng: &mut ChaCha8Rng) -> Self {
        Self {
            number: rng.gen_bool(0.7).then(|| rng.gen()),
            primitives: rng
                .gen_bool(0.7)
                .then(|| PrimitiveRecord::random(rng)),
            fixed: rng
                .gen_bool(0.7)
                .then(|| FixedLengthRecord::random(rng)),
        }
    }
}

impl Record for GenericRecord {
    fn schema() -> TypeDesc {
        Schema::new(Self::NAME)
            .field("number", TypeDesc::Boxed(Primitive::I32))
            .field("primitives", PrimitiveRecord::schema())
            .field("fixed", FixedLengthRecord::schema())
            .into_desc()
    }

    fn to_value(&self) -> Value {
        Value::Record(vec![
            self.number.into(),
            self.primitives.to_value(),
            self.fixed.to_value(),
        ])
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        let mut f = FieldReader::new(Self::NAME, value, 3)?;
        Ok(Self {
            number: f.read()?,
            primitives: f.read()?,
            fixed: f.read()?,
        })
    }
}
