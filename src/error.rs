//! Error types for ream-grid

use thiserror::Error;

use crate::cluster::{AttributeError, MembershipError};
use crate::config::ConfigError;
use crate::invocation::InvocationError;
use crate::portable::PortableError;

/// Main error type for grid operations
#[derive(Error, Debug)]
pub enum GridError {
    /// Attribute store errors
    #[error("Attribute error: {0}")]
    Attribute(#[from] AttributeError),

    /// Serialization errors
    #[error("Portable error: {0}")]
    Portable(#[from] PortableError),

    /// Membership errors
    #[error("Membership error: {0}")]
    Membership(#[from] MembershipError),

    /// Invocation errors
    #[error("Invocation error: {0}")]
    Invocation(#[from] InvocationError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for grid operations
pub type GridResult<T> = Result<T, GridError>;
