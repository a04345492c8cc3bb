//! Operation command objects

use crate::portable::{Portable, ResultValue};

/// A portable request executed against a named service
///
/// The empty instance from `Default` is what the receiving node decodes
/// into; `call` then runs with the fields the caller wrote.
pub trait Operation: Portable + Default {
    /// Concrete service the operation runs against
    type Service: Send + Sync + 'static;

    /// Value sent back to the caller
    type Output: ResultValue;

    /// Name the service is registered under
    const SERVICE_NAME: &'static str;

    /// Whether resending after a timeout or lost connection is safe
    const RETRYABLE: bool;

    /// Execute against the resolved service
    ///
    /// Runs on a blocking worker thread. An `Err` or a panic is reported to
    /// the caller as an execution failure.
    fn call(&self, service: &Self::Service) -> Result<Self::Output, String>;
}
