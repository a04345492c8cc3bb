//! Named-field writer handed to [`Portable::write_portable`]

use std::collections::HashSet;

use bytes::Bytes;

use super::codec::encode_object;
use super::{FieldValue, Portable, PortableError, PortableResult};

/// Collects named, typed fields in the order the schema writes them
#[derive(Debug, Default)]
pub struct PortableWriter {
    /// Fields in write order
    fields: Vec<(String, FieldValue)>,
    /// Names already written
    names: HashSet<String>,
}

impl PortableWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a field of any type
    pub fn write_value(&mut self, name: &str, value: FieldValue) -> PortableResult<()> {
        if !self.names.insert(name.to_string()) {
            return Err(PortableError::DuplicateField(name.to_string()));
        }
        self.fields.push((name.to_string(), value));
        Ok(())
    }

    pub fn write_utf(&mut self, name: &str, value: &str) -> PortableResult<()> {
        self.write_value(name, FieldValue::Utf(value.to_string()))
    }

    pub fn write_bool(&mut self, name: &str, value: bool) -> PortableResult<()> {
        self.write_value(name, FieldValue::Bool(value))
    }

    pub fn write_byte(&mut self, name: &str, value: i8) -> PortableResult<()> {
        self.write_value(name, FieldValue::Byte(value))
    }

    pub fn write_short(&mut self, name: &str, value: i16) -> PortableResult<()> {
        self.write_value(name, FieldValue::Short(value))
    }

    pub fn write_int(&mut self, name: &str, value: i32) -> PortableResult<()> {
        self.write_value(name, FieldValue::Int(value))
    }

    pub fn write_long(&mut self, name: &str, value: i64) -> PortableResult<()> {
        self.write_value(name, FieldValue::Long(value))
    }

    pub fn write_float(&mut self, name: &str, value: f32) -> PortableResult<()> {
        self.write_value(name, FieldValue::Float(value))
    }

    pub fn write_double(&mut self, name: &str, value: f64) -> PortableResult<()> {
        self.write_value(name, FieldValue::Double(value))
    }

    pub fn write_byte_array(&mut self, name: &str, value: Bytes) -> PortableResult<()> {
        self.write_value(name, FieldValue::ByteArray(value))
    }

    /// Write a nested portable with its own header
    pub fn write_portable(&mut self, name: &str, value: &dyn Portable) -> PortableResult<()> {
        let encoded = encode_object(value)?;
        self.write_value(name, FieldValue::Portable(encoded))
    }

    /// Write a sequence of nested portables
    pub fn write_portable_array<T: Portable>(&mut self, name: &str, values: &[T]) -> PortableResult<()> {
        let encoded = values
            .iter()
            .map(|value| encode_object(value))
            .collect::<PortableResult<Vec<_>>>()?;
        self.write_value(name, FieldValue::PortableArray(encoded))
    }

    /// Number of fields written so far
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn into_fields(self) -> Vec<(String, FieldValue)> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_field_rejected() {
        let mut writer = PortableWriter::new();
        writer.write_int("a", 1).unwrap();
        let err = writer.write_long("a", 2).unwrap_err();
        assert_eq!(err, PortableError::DuplicateField("a".to_string()));
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn test_fields_keep_write_order() {
        let mut writer = PortableWriter::new();
        writer.write_utf("z", "last-name").unwrap();
        writer.write_bool("a", false).unwrap();
        let names: Vec<String> = writer.into_fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z".to_string(), "a".to_string()]);
    }
}
