//! Portable binary codec
//!
//! Layout of an encoded record (integers big-endian):
//!
//! ```text
//! [format:u8][factory_id:i32][class_id:i32][field_count:u16]
//! field_count × [name_len:u16][name:utf8][tag:u8][value]
//! ```
//!
//! Values: utf and byte arrays are `[len:u32][bytes]`, nested portables are
//! `[len:u32][record]`, portable arrays are `[count:u32]` followed by that
//! many nested portables. Fields appear in writer order; readers never rely
//! on it.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::registry::SchemaRegistry;
use super::writer::PortableWriter;
use super::{AsAny, FieldType, FieldValue, Portable, PortableError, PortableReader, PortableResult};

/// Version byte leading every record
pub const FORMAT_VERSION: u8 = 1;

/// Bytes taken by the record header before the fields
pub const HEADER_SIZE: usize = 1 + 4 + 4 + 2;

/// Registry-backed encoder/decoder
#[derive(Debug, Clone)]
pub struct PortableCodec {
    registry: Arc<SchemaRegistry>,
}

impl PortableCodec {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Codec over the process-wide registry, if one is installed
    pub fn global() -> Option<Self> {
        SchemaRegistry::global().map(Self::new)
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn encode(&self, object: &dyn Portable) -> PortableResult<Bytes> {
        encode_object(object)
    }

    pub fn decode(&self, bytes: &[u8]) -> PortableResult<Box<dyn Portable>> {
        decode_with(&self.registry, bytes)
    }

    /// Decode and downcast to a concrete schema type
    pub fn decode_as<T: Portable>(&self, bytes: &[u8]) -> PortableResult<T> {
        decode_as_with(&self.registry, bytes)
    }
}

/// Read the `(factory_id, class_id)` header without decoding the body
pub fn read_header(bytes: &[u8]) -> PortableResult<(i32, i32)> {
    let mut buf = bytes;
    need(&buf, HEADER_SIZE, "header")?;
    let format = buf.get_u8();
    if format != FORMAT_VERSION {
        return Err(PortableError::Malformed(format!("unsupported format version {}", format)));
    }
    Ok((buf.get_i32(), buf.get_i32()))
}

/// Encode an object; needs no registry
pub fn encode_object(object: &dyn Portable) -> PortableResult<Bytes> {
    let mut writer = PortableWriter::new();
    object.write_portable(&mut writer)?;
    let fields = writer.into_fields();

    let field_count = u16::try_from(fields.len())
        .map_err(|_| PortableError::Malformed(format!("too many fields: {}", fields.len())))?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + fields.len() * 16);
    buf.put_u8(FORMAT_VERSION);
    buf.put_i32(object.factory_id());
    buf.put_i32(object.class_id());
    buf.put_u16(field_count);

    for (name, value) in &fields {
        let name_len = u16::try_from(name.len())
            .map_err(|_| PortableError::Malformed(format!("field name too long: {}", name.len())))?;
        buf.put_u16(name_len);
        buf.put_slice(name.as_bytes());
        buf.put_u8(value.field_type().tag());
        put_value(&mut buf, value)?;
    }

    Ok(buf.freeze())
}

/// Decode through `registry`
///
/// The schema is resolved before the body is parsed, so an unknown pair
/// fails with [`PortableError::UnknownSchema`] and nothing is constructed.
pub fn decode_with(registry: &SchemaRegistry, bytes: &[u8]) -> PortableResult<Box<dyn Portable>> {
    let (factory_id, class_id) = read_header(bytes)?;
    let mut instance = registry.resolve(factory_id, class_id)?;

    let mut buf = &bytes[HEADER_SIZE - 2..];
    let field_count = buf.get_u16();
    let mut fields = HashMap::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let name = get_name(&mut buf)?;
        need(&buf, 1, "field tag")?;
        let tag = buf.get_u8();
        let field_type = FieldType::from_tag(tag)
            .ok_or_else(|| PortableError::Malformed(format!("unknown tag {} for field '{}'", tag, name)))?;
        let value = get_value(&mut buf, field_type)?;
        if fields.insert(name.clone(), value).is_some() {
            return Err(PortableError::Malformed(format!("field '{}' appears twice", name)));
        }
    }
    if buf.has_remaining() {
        return Err(PortableError::Malformed(format!(
            "{} trailing bytes after last field",
            buf.remaining()
        )));
    }

    let reader = PortableReader::new(factory_id, class_id, fields, registry);
    instance.read_portable(&reader)?;
    Ok(instance)
}

/// Decode through `registry` and downcast to `T`
pub fn decode_as_with<T: Portable>(registry: &SchemaRegistry, bytes: &[u8]) -> PortableResult<T> {
    let instance = decode_with(registry, bytes)?;
    let actual = (instance.factory_id(), instance.class_id());
    instance
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| PortableError::ClassMismatch {
            expected: std::any::type_name::<T>().to_string(),
            factory_id: actual.0,
            class_id: actual.1,
        })
}

fn need(buf: &&[u8], len: usize, what: &str) -> PortableResult<()> {
    if buf.remaining() < len {
        return Err(PortableError::Malformed(format!(
            "truncated {}: need {} bytes, have {}",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(())
}

fn put_len(buf: &mut BytesMut, len: usize) -> PortableResult<()> {
    let len = u32::try_from(len).map_err(|_| PortableError::Malformed(format!("length {} exceeds u32", len)))?;
    buf.put_u32(len);
    Ok(())
}

fn put_value(buf: &mut BytesMut, value: &FieldValue) -> PortableResult<()> {
    match value {
        FieldValue::Utf(s) => {
            put_len(buf, s.len())?;
            buf.put_slice(s.as_bytes());
        }
        FieldValue::Bool(b) => buf.put_u8(u8::from(*b)),
        FieldValue::Byte(v) => buf.put_i8(*v),
        FieldValue::Short(v) => buf.put_i16(*v),
        FieldValue::Int(v) => buf.put_i32(*v),
        FieldValue::Long(v) => buf.put_i64(*v),
        FieldValue::Float(v) => buf.put_f32(*v),
        FieldValue::Double(v) => buf.put_f64(*v),
        FieldValue::ByteArray(bytes) | FieldValue::Portable(bytes) => {
            put_len(buf, bytes.len())?;
            buf.put_slice(bytes);
        }
        FieldValue::PortableArray(items) => {
            put_len(buf, items.len())?;
            for item in items {
                put_len(buf, item.len())?;
                buf.put_slice(item);
            }
        }
    }
    Ok(())
}

fn get_name(buf: &mut &[u8]) -> PortableResult<String> {
    need(buf, 2, "field name length")?;
    let len = buf.get_u16() as usize;
    need(buf, len, "field name")?;
    let name = std::str::from_utf8(&buf[..len])
        .map_err(|e| PortableError::Malformed(format!("field name is not utf-8: {}", e)))?
        .to_string();
    buf.advance(len);
    Ok(name)
}

fn get_len_prefixed(buf: &mut &[u8], what: &str) -> PortableResult<Bytes> {
    need(buf, 4, what)?;
    let len = buf.get_u32() as usize;
    need(buf, len, what)?;
    let bytes = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(bytes)
}

fn get_value(buf: &mut &[u8], field_type: FieldType) -> PortableResult<FieldValue> {
    let value = match field_type {
        FieldType::Utf => {
            let raw = get_len_prefixed(buf, "utf value")?;
            let s = String::from_utf8(raw.to_vec())
                .map_err(|e| PortableError::Malformed(format!("utf field is not utf-8: {}", e)))?;
            FieldValue::Utf(s)
        }
        FieldType::Bool => {
            need(buf, 1, "bool value")?;
            match buf.get_u8() {
                0 => FieldValue::Bool(false),
                1 => FieldValue::Bool(true),
                other => return Err(PortableError::Malformed(format!("invalid bool byte {}", other))),
            }
        }
        FieldType::Byte => {
            need(buf, 1, "byte value")?;
            FieldValue::Byte(buf.get_i8())
        }
        FieldType::Short => {
            need(buf, 2, "short value")?;
            FieldValue::Short(buf.get_i16())
        }
        FieldType::Int => {
            need(buf, 4, "int value")?;
            FieldValue::Int(buf.get_i32())
        }
        FieldType::Long => {
            need(buf, 8, "long value")?;
            FieldValue::Long(buf.get_i64())
        }
        FieldType::Float => {
            need(buf, 4, "float value")?;
            FieldValue::Float(buf.get_f32())
        }
        FieldType::Double => {
            need(buf, 8, "double value")?;
            FieldValue::Double(buf.get_f64())
        }
        FieldType::ByteArray => FieldValue::ByteArray(get_len_prefixed(buf, "byte array")?),
        FieldType::Portable => FieldValue::Portable(get_len_prefixed(buf, "nested portable")?),
        FieldType::PortableArray => {
            need(buf, 4, "portable array count")?;
            let count = buf.get_u32() as usize;
            // Each element needs at least its length prefix
            need(buf, count.saturating_mul(4), "portable array")?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(get_len_prefixed(buf, "portable array element")?);
            }
            FieldValue::PortableArray(items)
        }
    };
    Ok(value)
}
