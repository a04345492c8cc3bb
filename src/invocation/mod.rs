//! Remote invocation
//!
//! Operations are portable command objects addressed to a named service.
//! The caller wraps one in a [`RequestEnvelope`], the [`Dispatcher`] ships
//! it through a [`Transport`] and the receiving [`InvocationServer`]
//! decodes it, resolves the service and runs it off the I/O task. The
//! [`RetryController`] resends an envelope after a timeout or lost
//! connection, but only when the operation declared itself retryable.

pub mod dispatcher;
pub mod envelope;
pub mod locator;
pub mod operation;
pub mod response;
pub mod retry;
pub mod server;
pub mod state;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use envelope::RequestEnvelope;
pub use locator::ServiceLocator;
pub use operation::Operation;
pub use response::{FaultKind, InvocationResponse, RemoteFault};
pub use retry::{FixedTarget, RetryController, RetryPolicy, RoundRobinTargets, TargetResolver};
pub use server::InvocationServer;
pub use state::{InvocationPhase, InvocationState};
pub use transport::{LocalTransport, Transport};

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::portable::{PortableError, PortableResult, SchemaRegistryBuilder};

/// Factory id of the invocation system portables
pub const INVOCATION_FACTORY_ID: i32 = -3;

/// Class id of [`InvocationResponse`]
pub const RESPONSE_CLASS_ID: i32 = 1;

/// Result type for invocations
pub type InvocationResult<T> = Result<T, InvocationError>;

/// Caller-side invocation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvocationError {
    /// No reply within the per-attempt timeout
    #[error("no reply from {target} within {after:?}")]
    Timeout { target: SocketAddr, after: Duration },

    /// The connection to the target dropped or never existed
    #[error("connection to {target} lost: {reason}")]
    ConnectionLost { target: SocketAddr, reason: String },

    /// The target answered with a failure
    #[error("remote failure: {0}")]
    Remote(RemoteFault),

    /// A retryable invocation ran out of attempts
    #[error("gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<InvocationError>,
    },

    /// No member available to send to
    #[error("no target available for attempt {attempt}")]
    NoTarget { attempt: u32 },

    /// State machine misuse
    #[error("invalid invocation transition {from:?} -> {to:?}")]
    InvalidTransition { from: InvocationPhase, to: InvocationPhase },

    /// Local encoding or decoding failed
    #[error("portable error: {0}")]
    Portable(#[from] PortableError),
}

impl InvocationError {
    /// Failures that may be cured by sending the same request again
    pub fn is_transient(&self) -> bool {
        matches!(self, InvocationError::Timeout { .. } | InvocationError::ConnectionLost { .. })
    }

    /// The fault reported by the remote service, if that is what this is
    pub fn remote_fault(&self) -> Option<&RemoteFault> {
        match self {
            InvocationError::Remote(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Register the portables every invoking node needs
pub fn register_system_types(builder: SchemaRegistryBuilder) -> PortableResult<SchemaRegistryBuilder> {
    builder.register_type::<InvocationResponse>()
}
