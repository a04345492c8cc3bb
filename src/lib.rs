//! # ream-grid
//!
//! Member identity, portable serialization and retry-aware remote invocation
//! for a distributed in-memory cluster.
//!
//! A node describes itself as a [`Member`] with typed attributes, exchanges
//! member records encoded with the name-addressed [`portable`] format, and
//! invokes [`Operation`]s on named services of other members. Operations
//! declare whether they may be resent; the [`RetryController`] only resends
//! those after a timeout or a lost connection.

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod executor;
pub mod invocation;
pub mod portable;

use std::net::SocketAddr;
use std::sync::Arc;

// Re-export main types
pub use cluster::{AttributeStore, AttributeType, AttributeValue, ClusterView, Member};
pub use config::{GridConfig, InvocationConfig, MemberConfig};
pub use error::{GridError, GridResult};
pub use executor::{DistributedExecutorService, ExecutorPortableHook, IsShutdownRequest, ShutdownRequest};
pub use invocation::{
    Dispatcher, FixedTarget, InvocationError, InvocationServer, LocalTransport, Operation, RequestEnvelope,
    RetryController, RetryPolicy, ServiceLocator, TargetResolver, Transport,
};
pub use portable::{Portable, PortableCodec, PortableError, PortableReader, PortableWriter, SchemaRegistry};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Registry builder pre-loaded with every built-in schema
///
/// Applications add their own operations before calling `build`.
pub fn registry_builder() -> portable::PortableResult<portable::SchemaRegistryBuilder> {
    let builder = SchemaRegistry::builder()
        .register_type::<cluster::Member>()?
        .register_type::<cluster::AttributeEntry>()?
        .register_factory(ExecutorPortableHook)?;
    invocation::register_system_types(builder)
}

/// Registry with only the built-in schemas
pub fn default_registry() -> portable::PortableResult<Arc<SchemaRegistry>> {
    Ok(registry_builder()?.build())
}

/// One cluster node with all components wired together
#[derive(Debug)]
pub struct GridNode {
    /// Local member and known peers
    pub view: ClusterView,
    /// Serves incoming invocations
    pub server: Arc<InvocationServer>,
    /// Sends outgoing invocations
    pub controller: RetryController,
    /// Built-in executor service
    pub executor: Arc<DistributedExecutorService>,
}

impl GridNode {
    /// Build a node over the built-in schemas
    pub fn new(config: &GridConfig, transport: Arc<dyn Transport>) -> GridResult<Self> {
        Self::with_registry(config, transport, default_registry()?)
    }

    /// Build a node over an application registry
    ///
    /// `registry` must include the schemas from [`registry_builder`].
    pub fn with_registry(
        config: &GridConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<SchemaRegistry>,
    ) -> GridResult<Self> {
        let policy = config.invocation.retry_policy()?;
        let codec = PortableCodec::new(Arc::clone(&registry));
        let view = ClusterView::new(config.member.local_member(), codec.clone())?;

        let executor = Arc::new(DistributedExecutorService::new());
        let locator = Arc::new(ServiceLocator::new());
        locator.register(executor::SERVICE_NAME, Arc::clone(&executor));

        let server = Arc::new(InvocationServer::new(registry, locator));
        server.register_operation::<IsShutdownRequest>();
        server.register_operation::<ShutdownRequest>();

        let controller = RetryController::new(Dispatcher::new(transport, codec), policy);

        tracing::info!(member = %view.local_member(), "grid node created");
        Ok(Self {
            view,
            server,
            controller,
            executor,
        })
    }

    pub fn local_member(&self) -> &Member {
        self.view.local_member()
    }

    pub fn address(&self) -> SocketAddr {
        self.view.local_member().socket_address()
    }

    /// Invoke `operation` on `target` under the node's retry policy
    pub async fn invoke<Op: Operation>(&self, operation: &Op, target: SocketAddr) -> GridResult<Op::Output> {
        Ok(self.controller.invoke(operation, &FixedTarget(target)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_registry_knows_builtins() {
        let registry = default_registry().unwrap();
        assert!(registry.contains(cluster::CLUSTER_FACTORY_ID, cluster::MEMBER_CLASS_ID));
        assert!(registry.contains(cluster::CLUSTER_FACTORY_ID, cluster::ATTRIBUTE_ENTRY_CLASS_ID));
        assert!(registry.contains(executor::EXECUTOR_FACTORY_ID, executor::IS_SHUTDOWN_REQUEST));
        assert!(registry.contains(executor::EXECUTOR_FACTORY_ID, executor::SHUTDOWN_REQUEST));
        assert!(registry.contains(invocation::INVOCATION_FACTORY_ID, invocation::RESPONSE_CLASS_ID));
    }

    #[test]
    fn test_node_from_default_config() {
        let node = GridNode::new(&GridConfig::default(), Arc::new(LocalTransport::new())).unwrap();
        assert!(node.local_member().is_local());
        assert_eq!(node.address(), MemberConfig::default().bind_address);
        assert_eq!(node.view.len(), 1);
    }

    #[test]
    fn test_node_rejects_invalid_policy() {
        let mut config = GridConfig::default();
        config.invocation.max_attempts = 0;
        let result = GridNode::new(&config, Arc::new(LocalTransport::new()));
        assert!(matches!(result, Err(GridError::Config(_))));
    }
}
