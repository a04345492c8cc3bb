//! Invocation responses
//!
//! Every reply, successful or not, travels as one portable record. A
//! success carries the operation's return value under `"v"`; a failure
//! carries a fault kind and message so the caller can tell a service-side
//! problem apart from a local timeout.

use std::fmt;

use thiserror::Error;

use super::{INVOCATION_FACTORY_ID, RESPONSE_CLASS_ID};
use crate::portable::{FieldValue, Portable, PortableError, PortableReader, PortableResult, PortableWriter};

/// Category of a failure reported by the receiving node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FaultKind {
    /// Request named a schema the receiver does not know
    UnknownSchema = 1,
    /// Request payload could not be decoded
    Serialization = 2,
    /// No service under the requested name
    ServiceNotFound = 3,
    /// Decoded object is not a registered operation
    UnsupportedOperation = 4,
    /// The operation returned an error or panicked
    Execution = 5,
}

impl FaultKind {
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(FaultKind::UnknownSchema),
            2 => Some(FaultKind::Serialization),
            3 => Some(FaultKind::ServiceNotFound),
            4 => Some(FaultKind::UnsupportedOperation),
            5 => Some(FaultKind::Execution),
            _ => None,
        }
    }

    pub fn code(self) -> i8 {
        self as i8
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::UnknownSchema => "unknown schema",
            FaultKind::Serialization => "serialization error",
            FaultKind::ServiceNotFound => "service not found",
            FaultKind::UnsupportedOperation => "unsupported operation",
            FaultKind::Execution => "execution error",
        };
        f.write_str(name)
    }
}

/// A failure reported by the remote side
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct RemoteFault {
    pub kind: FaultKind,
    pub message: String,
}

impl RemoteFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<PortableError> for RemoteFault {
    fn from(err: PortableError) -> Self {
        let kind = match err {
            PortableError::UnknownSchema { .. } => FaultKind::UnknownSchema,
            _ => FaultKind::Serialization,
        };
        RemoteFault::new(kind, err.to_string())
    }
}

/// Outcome of one remote execution
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResponse {
    Success(FieldValue),
    Failure(RemoteFault),
}

impl InvocationResponse {
    /// Unwrap into the value or the remote fault
    pub fn into_result(self) -> Result<FieldValue, RemoteFault> {
        match self {
            InvocationResponse::Success(value) => Ok(value),
            InvocationResponse::Failure(fault) => Err(fault),
        }
    }
}

impl Default for InvocationResponse {
    fn default() -> Self {
        InvocationResponse::Failure(RemoteFault::new(FaultKind::Serialization, String::new()))
    }
}

impl Portable for InvocationResponse {
    fn factory_id(&self) -> i32 {
        INVOCATION_FACTORY_ID
    }

    fn class_id(&self) -> i32 {
        RESPONSE_CLASS_ID
    }

    fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()> {
        match self {
            InvocationResponse::Success(value) => {
                writer.write_bool("ok", true)?;
                writer.write_value("v", value.clone())
            }
            InvocationResponse::Failure(fault) => {
                writer.write_bool("ok", false)?;
                writer.write_byte("k", fault.kind.code())?;
                writer.write_utf("m", &fault.message)
            }
        }
    }

    fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()> {
        *self = if reader.read_bool("ok")? {
            InvocationResponse::Success(reader.read_value("v")?)
        } else {
            let code = reader.read_byte("k")?;
            let kind = FaultKind::from_code(code)
                .ok_or_else(|| PortableError::Malformed(format!("unknown fault kind {}", code)))?;
            InvocationResponse::Failure(RemoteFault::new(kind, reader.read_utf("m")?))
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portable::{PortableCodec, SchemaRegistry};

    fn codec() -> PortableCodec {
        PortableCodec::new(
            SchemaRegistry::builder()
                .register_type::<InvocationResponse>()
                .unwrap()
                .build(),
        )
    }

    #[test]
    fn test_success_and_failure_round_trip() {
        let codec = codec();
        for response in [
            InvocationResponse::Success(FieldValue::Bool(true)),
            InvocationResponse::Success(FieldValue::Long(-9)),
            InvocationResponse::Failure(RemoteFault::new(FaultKind::ServiceNotFound, "no 'x'")),
        ] {
            let decoded: InvocationResponse = codec.decode_as(&codec.encode(&response).unwrap()).unwrap();
            assert_eq!(decoded, response);
        }
    }

    #[test]
    fn test_unknown_schema_maps_to_fault_kind() {
        let fault = RemoteFault::from(PortableError::UnknownSchema {
            factory_id: 1,
            class_id: 2,
        });
        assert_eq!(fault.kind, FaultKind::UnknownSchema);

        let fault = RemoteFault::from(PortableError::Malformed("x".to_string()));
        assert_eq!(fault.kind, FaultKind::Serialization);
    }
}
