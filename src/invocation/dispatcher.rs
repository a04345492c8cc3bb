//! Single-attempt dispatch

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::debug;

use super::response::InvocationResponse;
use super::{InvocationError, InvocationResult, Operation, RequestEnvelope, Transport};
use crate::portable::{FieldValue, PortableCodec, ResultValue};

/// Sends envelopes and decodes replies
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    codec: PortableCodec,
}

impl Dispatcher {
    /// `codec` must be able to resolve [`InvocationResponse`]
    pub fn new(transport: Arc<dyn Transport>, codec: PortableCodec) -> Self {
        Self { transport, codec }
    }

    pub fn codec(&self) -> &PortableCodec {
        &self.codec
    }

    /// Send once and wait for the reply
    ///
    /// A reply carrying a service-side failure becomes
    /// [`InvocationError::Remote`].
    pub async fn dispatch(&self, envelope: &RequestEnvelope, target: SocketAddr) -> InvocationResult<FieldValue> {
        debug!(service = envelope.service_name(), %target, "dispatching");
        let reply = self.transport.send(target, envelope).await?;
        let response: InvocationResponse = self.codec.decode_as(&reply)?;
        response.into_result().map_err(InvocationError::Remote)
    }

    /// Encode `operation`, send once and decode the typed result
    pub async fn invoke<Op: Operation>(&self, operation: &Op, target: SocketAddr) -> InvocationResult<Op::Output> {
        let envelope = RequestEnvelope::new(operation)?;
        let value = self.dispatch(&envelope, target).await?;
        Ok(<Op::Output as ResultValue>::from_field(value)?)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("codec", &self.codec).finish()
    }
}
