//! Field type tags and dynamically-typed field values

use std::fmt;

use bytes::Bytes;

use super::{PortableError, PortableResult};

/// Type tag written next to every field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    Utf = 1,
    Bool = 2,
    Byte = 3,
    Short = 4,
    Int = 5,
    Long = 6,
    Float = 7,
    Double = 8,
    ByteArray = 9,
    Portable = 10,
    PortableArray = 11,
}

impl FieldType {
    /// Decode a wire tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        let ty = match tag {
            1 => FieldType::Utf,
            2 => FieldType::Bool,
            3 => FieldType::Byte,
            4 => FieldType::Short,
            5 => FieldType::Int,
            6 => FieldType::Long,
            7 => FieldType::Float,
            8 => FieldType::Double,
            9 => FieldType::ByteArray,
            10 => FieldType::Portable,
            11 => FieldType::PortableArray,
            _ => return None,
        };
        Some(ty)
    }

    /// Wire tag
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Utf => "utf",
            FieldType::Bool => "bool",
            FieldType::Byte => "byte",
            FieldType::Short => "short",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::ByteArray => "byte[]",
            FieldType::Portable => "portable",
            FieldType::PortableArray => "portable[]",
        };
        f.write_str(name)
    }
}

/// A decoded field of any type
///
/// Nested portables are kept in their encoded form; they are decoded lazily
/// through the registry when a reader asks for them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Utf(String),
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Bytes),
    Portable(Bytes),
    PortableArray(Vec<Bytes>),
}

impl FieldValue {
    /// Tag of this value
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Utf(_) => FieldType::Utf,
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Byte(_) => FieldType::Byte,
            FieldValue::Short(_) => FieldType::Short,
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Long(_) => FieldType::Long,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::ByteArray(_) => FieldType::ByteArray,
            FieldValue::Portable(_) => FieldType::Portable,
            FieldValue::PortableArray(_) => FieldType::PortableArray,
        }
    }
}

/// Values an operation may return across the wire
///
/// Conversions are exact: a `FieldValue::Int` never satisfies an `i64`.
pub trait ResultValue: Sized + Send + 'static {
    /// Tag this type is carried under
    const FIELD_TYPE: FieldType;

    fn into_field(self) -> FieldValue;

    fn from_field(value: FieldValue) -> PortableResult<Self>;
}

macro_rules! result_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ResultValue for $ty {
                const FIELD_TYPE: FieldType = FieldType::$variant;

                fn into_field(self) -> FieldValue {
                    FieldValue::$variant(self)
                }

                fn from_field(value: FieldValue) -> PortableResult<Self> {
                    match value {
                        FieldValue::$variant(v) => Ok(v),
                        other => Err(PortableError::FieldTypeMismatch {
                            field: "result".to_string(),
                            expected: FieldType::$variant,
                            actual: other.field_type(),
                        }),
                    }
                }
            }
        )*
    };
}

result_value! {
    String => Utf,
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Bytes => ByteArray,
}
