//! Receiving side of an invocation
//!
//! Decodes the request through the local schema registry, finds the
//! operation's handler and the named service, runs the operation on a
//! blocking worker and encodes the outcome. Every failure along the way is
//! turned into a failure response; nothing here brings the node down.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::response::{FaultKind, InvocationResponse, RemoteFault};
use super::{InvocationResult, Operation, ServiceLocator};
use crate::portable::{encode_object, FieldValue, Portable, PortableCodec, ResultValue, SchemaRegistry};

type Handler =
    Arc<dyn Fn(Box<dyn Portable>, Arc<dyn Any + Send + Sync>) -> Result<FieldValue, RemoteFault> + Send + Sync>;

/// Executes incoming requests
pub struct InvocationServer {
    codec: PortableCodec,
    locator: Arc<ServiceLocator>,
    handlers: DashMap<(i32, i32), Handler>,
}

impl InvocationServer {
    pub fn new(registry: Arc<SchemaRegistry>, locator: Arc<ServiceLocator>) -> Self {
        Self {
            codec: PortableCodec::new(registry),
            locator,
            handlers: DashMap::new(),
        }
    }

    pub fn locator(&self) -> &Arc<ServiceLocator> {
        &self.locator
    }

    /// Accept `Op` requests
    ///
    /// The schema itself must also be resolvable through the registry.
    pub fn register_operation<Op: Operation>(&self) {
        let template = Op::default();
        let key = (template.factory_id(), template.class_id());

        let handler: Handler = Arc::new(|operation: Box<dyn Portable>, service: Arc<dyn Any + Send + Sync>| {
            let operation = operation.into_any().downcast::<Op>().map_err(|_| {
                RemoteFault::new(
                    FaultKind::UnsupportedOperation,
                    format!("decoded object is not {}", std::any::type_name::<Op>()),
                )
            })?;
            let service = service.downcast::<Op::Service>().map_err(|_| {
                RemoteFault::new(
                    FaultKind::ServiceNotFound,
                    format!("service '{}' has an unexpected type", Op::SERVICE_NAME),
                )
            })?;
            operation
                .call(&service)
                .map(ResultValue::into_field)
                .map_err(|message| RemoteFault::new(FaultKind::Execution, message))
        });

        debug!(factory_id = key.0, class_id = key.1, service = Op::SERVICE_NAME, "registered operation");
        self.handlers.insert(key, handler);
    }

    /// Execute one request and encode the reply
    pub async fn handle(&self, service_name: &str, payload: Bytes) -> InvocationResult<Bytes> {
        let response = match self.execute(service_name, &payload).await {
            Ok(value) => InvocationResponse::Success(value),
            Err(fault) => {
                warn!(service = service_name, kind = %fault.kind, message = %fault.message, "invocation failed");
                InvocationResponse::Failure(fault)
            }
        };
        Ok(encode_object(&response)?)
    }

    async fn execute(&self, service_name: &str, payload: &[u8]) -> Result<FieldValue, RemoteFault> {
        let operation = self.codec.decode(payload)?;
        let key = (operation.factory_id(), operation.class_id());

        let handler = self
            .handlers
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                RemoteFault::new(
                    FaultKind::UnsupportedOperation,
                    format!("factory {} class {} is not an operation", key.0, key.1),
                )
            })?;

        let service = self.locator.lookup_any(service_name).ok_or_else(|| {
            RemoteFault::new(FaultKind::ServiceNotFound, format!("no service named '{}'", service_name))
        })?;

        match tokio::task::spawn_blocking(move || handler(operation, service)).await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                let message = match join_error.try_into_panic() {
                    Ok(panic) => panic_message(panic.as_ref()),
                    Err(join_error) => join_error.to_string(),
                };
                Err(RemoteFault::new(FaultKind::Execution, message))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("operation panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("operation panicked: {}", message)
    } else {
        "operation panicked".to_string()
    }
}

impl fmt::Debug for InvocationServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut operations: Vec<(i32, i32)> = self.handlers.iter().map(|entry| *entry.key()).collect();
        operations.sort();
        f.debug_struct("InvocationServer")
            .field("operations", &operations)
            .field("locator", &self.locator)
            .finish()
    }
}
