//! Transport seam
//!
//! Connection management lives outside this crate. A [`Transport`] only has
//! to deliver an envelope to a target and hand back the encoded reply, or
//! report that the connection is gone. [`LocalTransport`] routes to
//! servers in the same process.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use super::{InvocationError, InvocationResult, InvocationServer, RequestEnvelope};

/// Delivers envelopes to members
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `envelope` to `target` and wait for the encoded reply
    async fn send(&self, target: SocketAddr, envelope: &RequestEnvelope) -> InvocationResult<Bytes>;
}

/// In-process transport keyed by member address
#[derive(Default)]
pub struct LocalTransport {
    servers: DashMap<SocketAddr, Arc<InvocationServer>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `server` reachable at `address`
    pub fn bind(&self, address: SocketAddr, server: Arc<InvocationServer>) {
        debug!(%address, "bound local server");
        self.servers.insert(address, server);
    }

    /// Drop the route to `address`; later sends see a lost connection
    pub fn unbind(&self, address: SocketAddr) -> bool {
        self.servers.remove(&address).is_some()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, target: SocketAddr, envelope: &RequestEnvelope) -> InvocationResult<Bytes> {
        let server = self
            .servers
            .get(&target)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| InvocationError::ConnectionLost {
                target,
                reason: "no server bound".to_string(),
            })?;
        server.handle(envelope.service_name(), envelope.payload().clone()).await
    }
}

impl fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses: Vec<SocketAddr> = self.servers.iter().map(|entry| *entry.key()).collect();
        f.debug_struct("LocalTransport").field("servers", &addresses).finish()
    }
}
