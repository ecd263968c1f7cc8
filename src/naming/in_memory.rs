//! Context factory with explicit bindings.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::{Context, ContextEnvironment, ContextFactory};
use super::error::NamingError;
use crate::bus::ConnectionFactory;

/// Binds names to connection factories held in memory.
///
/// Every context created shares the factory's bindings, so names bound later
/// are visible to contexts created earlier. The environment is ignored.
///
/// ```
/// use std::sync::Arc;
/// use artemis_relay::bus::InMemoryBroker;
/// use artemis_relay::naming::{
///     ContextEnvironment, ContextFactoryRegistry, InMemoryContextFactory, InitialContext,
/// };
///
/// let factory = InMemoryContextFactory::new();
/// factory.bind("jms/ConnectionFactory", Arc::new(InMemoryBroker::new()));
///
/// let mut registry = ContextFactoryRegistry::new();
/// registry.register("memory", Arc::new(factory));
///
/// let ctx = InitialContext::new(ContextEnvironment::new("memory", "mem://"), &registry).unwrap();
/// assert!(ctx.lookup("jms/ConnectionFactory").is_ok());
/// assert!(ctx.lookup("jms/Other").is_err());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryContextFactory {
    bindings: Arc<RwLock<HashMap<String, Arc<dyn ConnectionFactory>>>>,
}

impl InMemoryContextFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, name: impl Into<String>, factory: Arc<dyn ConnectionFactory>) {
        self.bindings.write().insert(name.into(), factory);
    }

    pub fn unbind(&self, name: &str) -> bool {
        self.bindings.write().remove(name).is_some()
    }
}

impl ContextFactory for InMemoryContextFactory {
    fn create(&self, _env: &ContextEnvironment) -> Result<Box<dyn Context>, NamingError> {
        Ok(Box::new(InMemoryContext {
            bindings: Arc::clone(&self.bindings),
        }))
    }
}

struct InMemoryContext {
    bindings: Arc<RwLock<HashMap<String, Arc<dyn ConnectionFactory>>>>,
}

impl Context for InMemoryContext {
    fn lookup(&self, name: &str) -> Result<Arc<dyn ConnectionFactory>, NamingError> {
        self.bindings
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| NamingError::NameNotFound(name.to_string()))
    }
}
