//! Named-field reader handed to [`Portable::read_portable`]
//!
//! The reader indexes every field of the record up front, so schemas fetch
//! fields by name in whatever order they like. Asking for a field the writer
//! never emitted is a [`PortableError::MissingField`]; asking for it with the
//! wrong type is a [`PortableError::FieldTypeMismatch`].

use std::collections::HashMap;

use bytes::Bytes;

use super::registry::SchemaRegistry;
use super::{FieldType, FieldValue, Portable, PortableError, PortableResult};

/// Field lookup over one decoded record
#[derive(Debug)]
pub struct PortableReader<'a> {
    factory_id: i32,
    class_id: i32,
    fields: HashMap<String, FieldValue>,
    registry: &'a SchemaRegistry,
}

macro_rules! typed_read {
    ($($(#[$doc:meta])* $fn_name:ident => $variant:ident : $ty:ty),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $fn_name(&self, name: &str) -> PortableResult<$ty> {
                match self.field(name)? {
                    FieldValue::$variant(v) => Ok(v.clone()),
                    other => Err(self.mismatch(name, FieldType::$variant, other)),
                }
            }
        )*
    };
}

impl<'a> PortableReader<'a> {
    pub(crate) fn new(
        factory_id: i32,
        class_id: i32,
        fields: HashMap<String, FieldValue>,
        registry: &'a SchemaRegistry,
    ) -> Self {
        Self {
            factory_id,
            class_id,
            fields,
            registry,
        }
    }

    pub fn factory_id(&self) -> i32 {
        self.factory_id
    }

    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    /// Whether the writer emitted `name`
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Type of `name`, if present
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).map(FieldValue::field_type)
    }

    /// Names of every field present, in no particular order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fetch a field of any type
    pub fn read_value(&self, name: &str) -> PortableResult<FieldValue> {
        self.field(name).cloned()
    }

    typed_read! {
        read_utf => Utf: String,
        read_bool => Bool: bool,
        read_byte => Byte: i8,
        read_short => Short: i16,
        read_int => Int: i32,
        read_long => Long: i64,
        read_float => Float: f32,
        read_double => Double: f64,
        read_byte_array => ByteArray: Bytes,
    }

    /// Decode a nested portable through the registry
    pub fn read_portable<T: Portable>(&self, name: &str) -> PortableResult<T> {
        match self.field(name)? {
            FieldValue::Portable(encoded) => super::codec::decode_as_with(self.registry, encoded),
            other => Err(self.mismatch(name, FieldType::Portable, other)),
        }
    }

    /// Decode a nested portable array through the registry
    pub fn read_portable_array<T: Portable>(&self, name: &str) -> PortableResult<Vec<T>> {
        match self.field(name)? {
            FieldValue::PortableArray(items) => items
                .iter()
                .map(|encoded| super::codec::decode_as_with(self.registry, encoded))
                .collect(),
            other => Err(self.mismatch(name, FieldType::PortableArray, other)),
        }
    }

    fn field(&self, name: &str) -> PortableResult<&FieldValue> {
        self.fields.get(name).ok_or_else(|| PortableError::MissingField {
            field: name.to_string(),
            factory_id: self.factory_id,
            class_id: self.class_id,
        })
    }

    fn mismatch(&self, name: &str, expected: FieldType, actual: &FieldValue) -> PortableError {
        PortableError::FieldTypeMismatch {
            field: name.to_string(),
            expected,
            actual: actual.field_type(),
        }
    }
}
