//! Node configuration
//!
//! Loaded from TOML. Every section and field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [member]
//! bind_address = "10.0.0.1:5701"
//!
//! [member.attributes]
//! region = { type = "string", value = "us-east" }
//! cores = { type = "int32", value = 16 }
//!
//! [invocation]
//! max_attempts = 3
//! attempt_timeout_ms = 5000
//! retry_backoff_ms = 100
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::{AttributeStore, AttributeValue, Member};
use crate::invocation::RetryPolicy;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML or has the wrong shape
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level node configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub member: MemberConfig,
    pub invocation: InvocationConfig,
}

impl GridConfig {
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Local member settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberConfig {
    /// Address this node serves on
    pub bind_address: SocketAddr,
    /// Attributes the member starts with
    pub attributes: HashMap<String, AttributeValue>,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 5701)),
            attributes: HashMap::new(),
        }
    }
}

impl MemberConfig {
    /// Local identity with a fresh id and the configured attributes
    pub fn local_member(&self) -> Member {
        let store = AttributeStore::with_attributes(self.attributes.clone());
        Member::with_store(uuid::Uuid::new_v4().to_string(), self.bind_address, true, Arc::new(store))
    }
}

/// Caller-side invocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationConfig {
    /// Total sends per retryable invocation
    pub max_attempts: u32,
    /// Reply timeout for each attempt
    pub attempt_timeout_ms: u64,
    /// Pause before each resend
    pub retry_backoff_ms: u64,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            attempt_timeout_ms: policy.attempt_timeout.as_millis() as u64,
            retry_backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

impl InvocationConfig {
    /// Validated retry policy
    pub fn retry_policy(&self) -> ConfigResult<RetryPolicy> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("invocation.max_attempts must be at least 1".to_string()));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "invocation.attempt_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GridConfig::from_toml_str("").unwrap();
        assert_eq!(config, GridConfig::default());
        assert_eq!(config.invocation.retry_policy().unwrap(), RetryPolicy::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = GridConfig::from_toml_str(
            r#"
            [member]
            bind_address = "10.0.0.1:5701"

            [member.attributes]
            region = { type = "string", value = "us-east" }
            cores = { type = "int32", value = 16 }

            [invocation]
            max_attempts = 5
            attempt_timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.member.bind_address, "10.0.0.1:5701".parse().unwrap());
        let member = config.member.local_member();
        assert!(member.is_local());
        assert_eq!(member.attribute::<String>("region").unwrap().as_deref(), Some("us-east"));
        assert_eq!(member.attribute::<i32>("cores").unwrap(), Some(16));

        let policy = config.invocation.retry_policy().unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.attempt_timeout, Duration::from_millis(250));
        assert_eq!(policy.backoff, RetryPolicy::default().backoff);
    }

    #[test]
    fn test_invalid_policy() {
        let config = InvocationConfig {
            max_attempts: 0,
            ..InvocationConfig::default()
        };
        assert!(matches!(config.retry_policy(), Err(ConfigError::Invalid(_))));

        let config = InvocationConfig {
            attempt_timeout_ms: 0,
            ..InvocationConfig::default()
        };
        assert!(matches!(config.retry_policy(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            GridConfig::from_toml_str("[member]\nbind_address = 7"),
            Err(ConfigError::Parse(_))
        ));
    }
}
