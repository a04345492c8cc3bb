//! Portable serialization
//!
//! A self-describing, name-addressed binary encoding. Every record starts
//! with a `(factory_id, class_id)` header naming its schema, followed by
//! fields tagged with their name and type. Readers fetch fields by name, so
//! writers and readers built against different schema versions interoperate
//! as long as every field a reader requires was written.

pub mod codec;
pub mod field;
pub mod reader;
pub mod registry;
pub mod writer;

pub use codec::{decode_as_with, decode_with, encode_object, read_header, PortableCodec, FORMAT_VERSION};
pub use field::{FieldType, FieldValue, ResultValue};
pub use reader::PortableReader;
pub use registry::{PortableConstructor, PortableFactory, SchemaRegistry, SchemaRegistryBuilder};
pub use writer::PortableWriter;

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Result type for portable operations
pub type PortableResult<T> = Result<T, PortableError>;

/// Portable encoding and decoding errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortableError {
    /// No schema registered for the header's pair
    #[error("unknown schema: factory {factory_id}, class {class_id}")]
    UnknownSchema { factory_id: i32, class_id: i32 },

    /// A required field was never written
    #[error("missing field '{field}' in factory {factory_id}, class {class_id}")]
    MissingField {
        field: String,
        factory_id: i32,
        class_id: i32,
    },

    /// A field was written with a different type than the reader expects
    #[error("field '{field}' is {actual}, expected {expected}")]
    FieldTypeMismatch {
        field: String,
        expected: FieldType,
        actual: FieldType,
    },

    /// A schema wrote the same field name twice
    #[error("field '{0}' written twice")]
    DuplicateField(String),

    /// The same pair was registered twice
    #[error("schema already registered: factory {factory_id}, class {class_id}")]
    DuplicateRegistration { factory_id: i32, class_id: i32 },

    /// Decoded object is not the type the caller asked for
    #[error("expected {expected}, decoded factory {factory_id}, class {class_id}")]
    ClassMismatch {
        expected: String,
        factory_id: i32,
        class_id: i32,
    },

    /// Corrupt, truncated or otherwise unreadable payload
    #[error("malformed portable payload: {0}")]
    Malformed(String),
}

/// Owned downcasting for boxed portables
pub trait AsAny: Any {
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type with a registered schema
///
/// `write_portable` emits every field by name; `read_portable` fetches
/// them by name from a reader and may treat fields as optional through
/// [`PortableReader::has_field`].
pub trait Portable: AsAny + Send + Sync + fmt::Debug {
    fn factory_id(&self) -> i32;

    fn class_id(&self) -> i32;

    fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()>;

    fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Leaf {
        label: String,
    }

    impl Portable for Leaf {
        fn factory_id(&self) -> i32 {
            -5
        }

        fn class_id(&self) -> i32 {
            2
        }

        fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()> {
            writer.write_utf("label", &self.label)
        }

        fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()> {
            self.label = reader.read_utf("label")?;
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Tree {
        root: Leaf,
        children: Vec<Leaf>,
    }

    impl Portable for Tree {
        fn factory_id(&self) -> i32 {
            -5
        }

        fn class_id(&self) -> i32 {
            1
        }

        fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()> {
            writer.write_portable_array("children", &self.children)?;
            writer.write_portable("root", &self.root)
        }

        fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()> {
            self.root = reader.read_portable("root")?;
            self.children = reader.read_portable_array("children")?;
            Ok(())
        }
    }

    fn codec() -> PortableCodec {
        PortableCodec::new(
            SchemaRegistry::builder()
                .register_type::<Tree>()
                .unwrap()
                .register_type::<Leaf>()
                .unwrap()
                .build(),
        )
    }

    #[test]
    fn test_nested_portables_round_trip() {
        let tree = Tree {
            root: Leaf { label: "root".to_string() },
            children: vec![
                Leaf { label: "a".to_string() },
                Leaf { label: "b".to_string() },
            ],
        };
        let codec = codec();
        let decoded: Tree = codec.decode_as(&codec.encode(&tree).unwrap()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_decode_as_wrong_type() {
        let codec = codec();
        let bytes = codec.encode(&Leaf::default()).unwrap();
        let err = codec.decode_as::<Tree>(&bytes).unwrap_err();
        assert!(matches!(err, PortableError::ClassMismatch { factory_id: -5, class_id: 2, .. }));
    }

    #[test]
    fn test_read_with_wrong_type_does_not_widen() {
        #[derive(Debug, Default)]
        struct Narrow;

        impl Portable for Narrow {
            fn factory_id(&self) -> i32 {
                -6
            }

            fn class_id(&self) -> i32 {
                1
            }

            fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()> {
                writer.write_int("n", 1)
            }

            fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()> {
                reader.read_long("n").map(|_| ())
            }
        }

        let codec = PortableCodec::new(SchemaRegistry::builder().register_type::<Narrow>().unwrap().build());
        let err = codec.decode(&codec.encode(&Narrow).unwrap()).unwrap_err();
        assert_eq!(
            err,
            PortableError::FieldTypeMismatch {
                field: "n".to_string(),
                expected: FieldType::Long,
                actual: FieldType::Int,
            }
        );
    }
}
