//! Service locator
//!
//! Backend services registered by stable name. Lookups are typed; a service
//! registered under the name but with a different concrete type is treated
//! the same as an absent one.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

type SharedService = Arc<dyn Any + Send + Sync>;

/// Name to service catalog
#[derive(Default)]
pub struct ServiceLocator {
    services: DashMap<String, SharedService>,
}

impl ServiceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under `name`, replacing any previous one
    pub fn register<S>(&self, name: impl Into<String>, service: Arc<S>) -> bool
    where
        S: Send + Sync + 'static,
    {
        let name = name.into();
        debug!(service = %name, "registered service");
        self.services.insert(name, service).is_some()
    }

    /// Typed lookup
    pub fn lookup<S>(&self, name: &str) -> Option<Arc<S>>
    where
        S: Send + Sync + 'static,
    {
        self.lookup_any(name).and_then(|service| service.downcast::<S>().ok())
    }

    /// Untyped lookup
    pub fn lookup_any(&self, name: &str) -> Option<SharedService> {
        self.services.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.services.remove(name).is_some()
    }
}

impl fmt::Debug for ServiceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.services.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        f.debug_struct("ServiceLocator").field("services", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;
    struct Other;

    #[test]
    fn test_typed_lookup() {
        let locator = ServiceLocator::new();
        assert!(!locator.register("counter", Arc::new(Counter)));
        assert!(locator.lookup::<Counter>("counter").is_some());
        assert!(locator.lookup::<Other>("counter").is_none());
        assert!(locator.lookup::<Counter>("missing").is_none());
    }

    #[test]
    fn test_replace_and_remove() {
        let locator = ServiceLocator::new();
        locator.register("svc", Arc::new(Counter));
        assert!(locator.register("svc", Arc::new(Other)));
        assert!(locator.lookup::<Other>("svc").is_some());
        assert!(locator.remove("svc"));
        assert!(!locator.contains("svc"));
    }
}
