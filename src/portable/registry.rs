//! Schema registry
//!
//! Maps a `(factory_id, class_id)` pair to a constructor for an empty
//! instance of that schema. Registration happens once at process start
//! through [`SchemaRegistryBuilder`]; the built registry is immutable, so
//! concurrent lookups need no locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use super::{Portable, PortableError, PortableResult};

/// Creates an empty instance ready for `read_portable`
pub type PortableConstructor = Arc<dyn Fn() -> Box<dyn Portable> + Send + Sync>;

/// Serves every class of a single factory id
pub trait PortableFactory: Send + Sync {
    /// Factory id this hook owns
    fn factory_id(&self) -> i32;

    /// Create an empty instance of `class_id`, or `None` if unknown
    fn create(&self, class_id: i32) -> Option<Box<dyn Portable>>;
}

static GLOBAL_REGISTRY: OnceCell<Arc<SchemaRegistry>> = OnceCell::new();

/// Builder collecting registrations before the registry is frozen
#[derive(Default)]
pub struct SchemaRegistryBuilder {
    classes: HashMap<(i32, i32), PortableConstructor>,
    factories: HashMap<i32, Arc<dyn PortableFactory>>,
}

impl SchemaRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single class
    pub fn register<F>(mut self, factory_id: i32, class_id: i32, constructor: F) -> PortableResult<Self>
    where
        F: Fn() -> Box<dyn Portable> + Send + Sync + 'static,
    {
        if self.classes.contains_key(&(factory_id, class_id)) {
            return Err(PortableError::DuplicateRegistration { factory_id, class_id });
        }
        debug!(factory_id, class_id, "registered portable class");
        self.classes.insert((factory_id, class_id), Arc::new(constructor));
        Ok(self)
    }

    /// Register `T` under the ids its default instance reports
    pub fn register_type<T>(self) -> PortableResult<Self>
    where
        T: Portable + Default,
    {
        let template = T::default();
        let (factory_id, class_id) = (template.factory_id(), template.class_id());
        self.register(factory_id, class_id, || Box::new(T::default()))
    }

    /// Register a factory serving a whole factory id
    pub fn register_factory<F>(mut self, factory: F) -> PortableResult<Self>
    where
        F: PortableFactory + 'static,
    {
        let factory_id = factory.factory_id();
        if self.factories.contains_key(&factory_id) {
            return Err(PortableError::DuplicateRegistration {
                factory_id,
                class_id: -1,
            });
        }
        debug!(factory_id, "registered portable factory");
        self.factories.insert(factory_id, Arc::new(factory));
        Ok(self)
    }

    /// Freeze the registrations
    pub fn build(self) -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry {
            classes: self.classes,
            factories: self.factories,
        })
    }
}

/// Frozen `(factory_id, class_id)` catalog
pub struct SchemaRegistry {
    classes: HashMap<(i32, i32), PortableConstructor>,
    factories: HashMap<i32, Arc<dyn PortableFactory>>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    /// Create an empty instance of the schema
    ///
    /// Explicit class registrations win over factories.
    pub fn resolve(&self, factory_id: i32, class_id: i32) -> PortableResult<Box<dyn Portable>> {
        let instance = match self.classes.get(&(factory_id, class_id)) {
            Some(constructor) => constructor(),
            None => self
                .factories
                .get(&factory_id)
                .and_then(|factory| factory.create(class_id))
                .ok_or(PortableError::UnknownSchema { factory_id, class_id })?,
        };

        if instance.factory_id() != factory_id || instance.class_id() != class_id {
            return Err(PortableError::ClassMismatch {
                expected: format!("factory {} class {}", factory_id, class_id),
                factory_id: instance.factory_id(),
                class_id: instance.class_id(),
            });
        }
        Ok(instance)
    }

    /// Whether the pair can be resolved
    pub fn contains(&self, factory_id: i32, class_id: i32) -> bool {
        self.resolve(factory_id, class_id).is_ok()
    }

    /// Install the process-wide registry; fails if one is already installed
    pub fn install_global(registry: Arc<SchemaRegistry>) -> Result<(), Arc<SchemaRegistry>> {
        GLOBAL_REGISTRY.set(registry)
    }

    /// Process-wide registry, if installed
    pub fn global() -> Option<Arc<SchemaRegistry>> {
        GLOBAL_REGISTRY.get().cloned()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&(i32, i32)> = self.classes.keys().collect();
        classes.sort();
        let mut factories: Vec<&i32> = self.factories.keys().collect();
        factories.sort();
        f.debug_struct("SchemaRegistry")
            .field("classes", &classes)
            .field("factories", &factories)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portable::{PortableReader, PortableWriter};

    #[derive(Debug, Default)]
    struct Probe;

    impl Portable for Probe {
        fn factory_id(&self) -> i32 {
            7
        }

        fn class_id(&self) -> i32 {
            1
        }

        fn write_portable(&self, _writer: &mut PortableWriter) -> PortableResult<()> {
            Ok(())
        }

        fn read_portable(&mut self, _reader: &PortableReader<'_>) -> PortableResult<()> {
            Ok(())
        }
    }

    struct ProbeHook;

    impl PortableFactory for ProbeHook {
        fn factory_id(&self) -> i32 {
            7
        }

        fn create(&self, class_id: i32) -> Option<Box<dyn Portable>> {
            match class_id {
                1 => Some(Box::new(Probe)),
                // Deliberately wrong: reports class 1 for class 2
                2 => Some(Box::new(Probe)),
                _ => None,
            }
        }
    }

    #[test]
    fn test_unknown_schema() {
        let registry = SchemaRegistry::builder().build();
        let err = registry.resolve(1, 2).unwrap_err();
        assert_eq!(err, PortableError::UnknownSchema { factory_id: 1, class_id: 2 });
    }

    #[test]
    fn test_register_type_and_resolve() {
        let registry = SchemaRegistry::builder().register_type::<Probe>().unwrap().build();
        let instance = registry.resolve(7, 1).unwrap();
        assert_eq!(instance.class_id(), 1);
        assert!(!registry.contains(7, 2));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let result = SchemaRegistry::builder()
            .register_type::<Probe>()
            .unwrap()
            .register_type::<Probe>();
        assert!(matches!(
            result,
            Err(PortableError::DuplicateRegistration { factory_id: 7, class_id: 1 })
        ));
    }

    #[test]
    fn test_factory_resolution_checks_ids() {
        let registry = SchemaRegistry::builder().register_factory(ProbeHook).unwrap().build();
        assert!(registry.resolve(7, 1).is_ok());
        assert!(matches!(
            registry.resolve(7, 2),
            Err(PortableError::ClassMismatch { .. })
        ));
        assert!(matches!(
            registry.resolve(7, 3),
            Err(PortableError::UnknownSchema { .. })
        ));
    }
}
