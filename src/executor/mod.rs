//! Distributed executor service
//!
//! Tracks which named executors have been shut down and serves the two
//! client operations that touch that state: [`ShutdownRequest`] and the
//! retryable [`IsShutdownRequest`].

use dashmap::DashMap;
use tracing::info;

use crate::invocation::Operation;
use crate::portable::{Portable, PortableFactory, PortableReader, PortableResult, PortableWriter};

/// Name the executor service is registered under
pub const SERVICE_NAME: &str = "grid:impl:executorService";

/// Factory id of the executor portables
pub const EXECUTOR_FACTORY_ID: i32 = -13;

/// Class id of [`IsShutdownRequest`]
pub const IS_SHUTDOWN_REQUEST: i32 = 1;

/// Class id of [`ShutdownRequest`]
pub const SHUTDOWN_REQUEST: i32 = 2;

/// Shutdown state of named executors
#[derive(Debug, Default)]
pub struct DistributedExecutorService {
    shutdown: DashMap<String, bool>,
}

impl DistributedExecutorService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` has been shut down; unknown executors are running
    pub fn is_shutdown(&self, name: &str) -> bool {
        self.shutdown.get(name).map(|flag| *flag).unwrap_or(false)
    }

    /// Shut `name` down; returns false if it already was
    pub fn shutdown(&self, name: &str) -> bool {
        let previous = self.shutdown.insert(name.to_string(), true);
        let changed = previous != Some(true);
        if changed {
            info!(executor = name, "executor shut down");
        }
        changed
    }
}

/// Query whether an executor is shut down
///
/// Reading the flag has no side effects, so the request may be resent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsShutdownRequest {
    name: String,
}

impl IsShutdownRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Portable for IsShutdownRequest {
    fn factory_id(&self) -> i32 {
        EXECUTOR_FACTORY_ID
    }

    fn class_id(&self) -> i32 {
        IS_SHUTDOWN_REQUEST
    }

    fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()> {
        writer.write_utf("n", &self.name)
    }

    fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()> {
        self.name = reader.read_utf("n")?;
        Ok(())
    }
}

impl Operation for IsShutdownRequest {
    type Service = DistributedExecutorService;
    type Output = bool;
    const SERVICE_NAME: &'static str = SERVICE_NAME;
    const RETRYABLE: bool = true;

    fn call(&self, service: &DistributedExecutorService) -> Result<bool, String> {
        Ok(service.is_shutdown(&self.name))
    }
}

/// Shut an executor down; answers whether this request changed its state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownRequest {
    name: String,
}

impl ShutdownRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Portable for ShutdownRequest {
    fn factory_id(&self) -> i32 {
        EXECUTOR_FACTORY_ID
    }

    fn class_id(&self) -> i32 {
        SHUTDOWN_REQUEST
    }

    fn write_portable(&self, writer: &mut PortableWriter) -> PortableResult<()> {
        writer.write_utf("n", &self.name)
    }

    fn read_portable(&mut self, reader: &PortableReader<'_>) -> PortableResult<()> {
        self.name = reader.read_utf("n")?;
        Ok(())
    }
}

impl Operation for ShutdownRequest {
    type Service = DistributedExecutorService;
    type Output = bool;
    const SERVICE_NAME: &'static str = SERVICE_NAME;
    const RETRYABLE: bool = false;

    fn call(&self, service: &DistributedExecutorService) -> Result<bool, String> {
        Ok(service.shutdown(&self.name))
    }
}

/// Creates executor portables by class id
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutorPortableHook;

impl PortableFactory for ExecutorPortableHook {
    fn factory_id(&self) -> i32 {
        EXECUTOR_FACTORY_ID
    }

    fn create(&self, class_id: i32) -> Option<Box<dyn Portable>> {
        match class_id {
            IS_SHUTDOWN_REQUEST => Some(Box::new(IsShutdownRequest::default())),
            SHUTDOWN_REQUEST => Some(Box::new(ShutdownRequest::default())),
            _ => None,
        }
    }
}
