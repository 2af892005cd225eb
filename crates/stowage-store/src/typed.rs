//! [`Store`]: a [`RawStore`] bound to one [`Record`] type.

use std::marker::PhantomData;

use stowage_arena::Scalar;
use stowage_core::{MemoryLocation, Record, StoreConfig, Value};
use stowage_layout::layout_of;

use crate::error::StoreError;
use crate::raw::RawStore;

/// Index-addressed storage for values of `R`.
///
/// The layout of `R` is resolved through the process-wide layout cache
/// when the store is created, so schema errors surface there and never
/// on access.
pub struct Store<R: Record> {
    raw: RawStore,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Record> Store<R> {
    /// Create a store for `R` with `metadata_bytes` of per-slot metadata.
    pub fn new(config: &StoreConfig, metadata_bytes: usize) -> Result<Self, StoreError> {
        let layout = layout_of(&R::schema())?;
        Ok(Self {
            raw: RawStore::new(layout, config, metadata_bytes)?,
            _marker: PhantomData,
        })
    }

    /// Store `value` at `index`, or make the slot absent for `None`.
    pub fn set(&mut self, index: usize, value: Option<&R>) -> Result<(), StoreError> {
        match value {
            Some(v) => self.raw.set_value(index, &v.to_value()),
            None => self.raw.set_null(index),
        }
    }

    /// Read the value at `index`.
    pub fn get(&self, index: usize) -> Result<Option<R>, StoreError> {
        match self.raw.get_value(index)? {
            Some(value) => Ok(Some(R::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Overwrite `into` with the value at `index`. Returns `false`, leaving
    /// `into` alone, if the slot is absent.
    pub fn get_into(&self, index: usize, into: &mut R) -> Result<bool, StoreError> {
        let mut value = Value::Null;
        if !self.raw.get_value_into(index, &mut value)? {
            return Ok(false);
        }
        into.assign(value)?;
        Ok(true)
    }

    /// Whether the slot at `index` is absent.
    pub fn is_null(&self, index: usize) -> Result<bool, StoreError> {
        self.raw.is_null(index)
    }

    /// See [`RawStore::get_scalar`].
    pub fn get_scalar<T: Scalar>(&self, index: usize, offset: usize) -> Result<T, StoreError> {
        self.raw.get_scalar(index, offset)
    }

    /// See [`RawStore::put_scalar`].
    pub fn put_scalar<T: Scalar>(
        &mut self,
        index: usize,
        offset: usize,
        value: T,
    ) -> Result<(), StoreError> {
        self.raw.put_scalar(index, offset, value)
    }

    /// See [`RawStore::check_flag`].
    pub fn check_flag(&self, index: usize, mask: u8) -> Result<bool, StoreError> {
        self.raw.check_flag(index, mask)
    }

    /// See [`RawStore::set_flag`].
    pub fn set_flag(&mut self, index: usize, mask: u8) -> Result<(), StoreError> {
        self.raw.set_flag(index, mask)
    }

    /// See [`RawStore::unset_flag`].
    pub fn unset_flag(&mut self, index: usize, mask: u8) -> Result<(), StoreError> {
        self.raw.unset_flag(index, mask)
    }

    /// Make every slot absent and empty the dynamic segment.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.raw.clear()
    }

    /// Release the arena now.
    pub fn destroy(self) {
        self.raw.destroy();
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Bytes per slot.
    pub fn node_size(&self) -> usize {
        self.raw.node_size()
    }

    /// Total arena size.
    pub fn memory_bytes(&self) -> usize {
        self.raw.memory_bytes()
    }

    /// Backing medium of the arena.
    pub fn location(&self) -> MemoryLocation {
        self.raw.location()
    }

    /// The untyped store underneath.
    pub fn raw(&self) -> &RawStore {
        &self.raw
    }

    /// The untyped store underneath, mutably.
    pub fn raw_mut(&mut self) -> &mut RawStore {
        &mut self.raw
    }
}

impl<R: Record> std::fmt::Debug for Store<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Store").field(&self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::{FieldReader, Primitive, Schema, SchemaError, TypeDesc, ValueError};

    #[derive(Clone, Debug, PartialEq, Default)]
    struct Reading {
        sensor: u32,
        value: f64,
        label: Option<String>,
    }

    impl Record for Reading {
        fn schema() -> TypeDesc {
            Schema::new("typed::Reading")
                .field("sensor", TypeDesc::Primitive(Primitive::U32))
                .field("value", TypeDesc::Primitive(Primitive::F64))
                .field("label", TypeDesc::Str)
                .into_desc()
        }

        fn to_value(&self) -> Value {
            Value::Record(vec![
                self.sensor.into(),
                self.value.into(),
                self.label.clone().into(),
            ])
        }

        fn from_value(value: Value) -> Result<Self, ValueError> {
            let mut r = FieldReader::new("typed::Reading", value, 3)?;
            Ok(Self {
                sensor: r.read()?,
                value: r.read()?,
                label: r.read()?,
            })
        }
    }

    struct Opaque;

    impl Record for Opaque {
        fn schema() -> TypeDesc {
            Schema::new("typed::Opaque")
                .field("inner", TypeDesc::Interface("Shape".into()))
                .into_desc()
        }

        fn to_value(&self) -> Value {
            Value::Record(vec![Value::Null])
        }

        fn from_value(_: Value) -> Result<Self, ValueError> {
            Ok(Self)
        }
    }

    fn config(n: u64) -> StoreConfig {
        StoreConfig::elements(n).with_dynamic_ratio(0.5)
    }

    #[test]
    fn typed_round_trip() {
        let mut store = Store::<Reading>::new(&config(8), 0).unwrap();
        let r = Reading {
            sensor: 7,
            value: -1.5,
            label: Some("boiler".into()),
        };
        store.set(3, Some(&r)).unwrap();
        assert_eq!(store.get(3).unwrap(), Some(r));
        assert_eq!(store.get(4).unwrap(), None);
        store.set(3, None).unwrap();
        assert!(store.is_null(3).unwrap());
    }

    #[test]
    fn get_into_overwrites_in_place() {
        let mut store = Store::<Reading>::new(&config(2), 0).unwrap();
        let r = Reading {
            sensor: 1,
            value: 2.0,
            label: None,
        };
        store.set(0, Some(&r)).unwrap();
        let mut into = Reading {
            sensor: 9,
            value: 9.0,
            label: Some("stale".into()),
        };
        assert!(store.get_into(0, &mut into).unwrap());
        assert_eq!(into, r);
        assert!(!store.get_into(1, &mut into).unwrap());
        assert_eq!(into, r);
    }

    #[test]
    fn primitive_and_string_stores() {
        let mut ints = Store::<i64>::new(&config(4), 0).unwrap();
        ints.set(0, Some(&-42)).unwrap();
        assert_eq!(ints.get(0).unwrap(), Some(-42));
        assert_eq!(ints.node_size(), 9);

        let mut strings = Store::<String>::new(&config(4), 0).unwrap();
        strings.set(2, Some(&"ünïcode".to_string())).unwrap();
        assert_eq!(strings.get(2).unwrap().as_deref(), Some("ünïcode"));
    }

    #[test]
    fn schema_errors_surface_at_construction() {
        assert!(matches!(
            Store::<Opaque>::new(&config(1), 0),
            Err(StoreError::Schema(SchemaError::InterfaceField { .. }))
        ));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn matches_model_and_releases_everything(
                ops in prop::collection::vec((0usize..8, prop::option::of("[a-z]{0,20}")), 1..100)
            ) {
                let cfg = StoreConfig::elements(8).with_dynamic_ratio(0.9);
                let mut store = Store::<String>::new(&cfg, 0).unwrap();
                let initial = store.raw().dynamic_free_blocks().unwrap();
                let mut model: Vec<Option<String>> = vec![None; 8];
                for (index, value) in ops {
                    store.set(index, value.as_ref()).unwrap();
                    model[index] = value;
                    for (i, expected) in model.iter().enumerate() {
                        prop_assert_eq!(&store.get(i).unwrap(), expected);
                    }
                }
                for i in 0..8 {
                    store.set(i, None).unwrap();
                }
                prop_assert_eq!(store.raw().dynamic_free_blocks().unwrap(), initial);
            }
        }
    }
}
