//! Request envelope

use std::fmt;

use bytes::Bytes;

use super::Operation;
use crate::portable::{encode_object, read_header, PortableResult};

/// Encoded operation labeled with its service name
///
/// Built once and never mutated. Clones share the payload buffer, so every
/// resend carries the exact bytes of the first attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    service_name: String,
    payload: Bytes,
    retryable: bool,
    factory_id: i32,
    class_id: i32,
}

impl RequestEnvelope {
    /// Encode `operation`
    pub fn new<Op: Operation>(operation: &Op) -> PortableResult<Self> {
        Ok(Self {
            service_name: Op::SERVICE_NAME.to_string(),
            payload: encode_object(operation)?,
            retryable: Op::RETRYABLE,
            factory_id: operation.factory_id(),
            class_id: operation.class_id(),
        })
    }

    /// Wrap an already encoded payload
    pub fn from_parts(service_name: impl Into<String>, payload: Bytes, retryable: bool) -> PortableResult<Self> {
        let (factory_id, class_id) = read_header(&payload)?;
        Ok(Self {
            service_name: service_name.into(),
            payload,
            retryable,
            factory_id,
            class_id,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn factory_id(&self) -> i32 {
        self.factory_id
    }

    pub fn class_id(&self) -> i32 {
        self.class_id
    }
}

impl fmt::Debug for RequestEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEnvelope")
            .field("service_name", &self.service_name)
            .field("factory_id", &self.factory_id)
            .field("class_id", &self.class_id)
            .field("retryable", &self.retryable)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
