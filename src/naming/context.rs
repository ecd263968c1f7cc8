//! Naming environment, contexts and the factory registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::error::NamingError;
use crate::bus::ConnectionFactory;

/// Settings an initial context is created from.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ContextEnvironment {
    /// Registered name of the [`ContextFactory`] to use.
    pub initial_context_factory: String,
    /// Where the directory (and the broker behind it) lives.
    pub provider_url: String,
    pub security_principal: Option<String>,
    pub security_credentials: Option<String>,
}

impl ContextEnvironment {
    pub fn new(initial_context_factory: impl Into<String>, provider_url: impl Into<String>) -> Self {
        Self {
            initial_context_factory: initial_context_factory.into(),
            provider_url: provider_url.into(),
            security_principal: None,
            security_credentials: None,
        }
    }

    pub fn with_credentials(
        mut self,
        principal: impl Into<String>,
        credentials: impl Into<String>,
    ) -> Self {
        self.security_principal = Some(principal.into());
        self.security_credentials = Some(credentials.into());
        self
    }
}

impl fmt::Debug for ContextEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextEnvironment")
            .field("initial_context_factory", &self.initial_context_factory)
            .field("provider_url", &self.provider_url)
            .field("security_principal", &self.security_principal)
            .field(
                "security_credentials",
                &self.security_credentials.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

/// A directory of named connection factories.
pub trait Context: Send + Sync {
    fn lookup(&self, name: &str) -> Result<Arc<dyn ConnectionFactory>, NamingError>;
}

/// Creates contexts for one kind of directory.
pub trait ContextFactory: Send + Sync {
    fn create(&self, env: &ContextEnvironment) -> Result<Box<dyn Context>, NamingError>;
}

/// Initial-context factories by name.
#[derive(Clone, Default)]
pub struct ContextFactoryRegistry {
    factories: HashMap<String, Arc<dyn ContextFactory>>,
}

impl ContextFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: impl Into<String>, factory: Arc<dyn ContextFactory>) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ContextFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// The starting context for lookups, built from an environment.
pub struct InitialContext {
    env: ContextEnvironment,
    inner: Box<dyn Context>,
}

impl InitialContext {
    /// Resolve the environment's initial-context factory and create a context.
    pub fn new(env: ContextEnvironment, registry: &ContextFactoryRegistry) -> Result<Self, NamingError> {
        let factory_name = env.initial_context_factory.trim();
        if factory_name.is_empty() {
            return Err(NamingError::NoInitialContext(
                "no initial context factory configured".to_string(),
            ));
        }

        let factory = registry
            .get(factory_name)
            .ok_or_else(|| NamingError::NoInitialContext(factory_name.to_string()))?;

        let inner = factory.create(&env)?;
        info!(
            factory = %env.initial_context_factory,
            provider_url = %env.provider_url,
            "Initial context created"
        );
        Ok(Self { env, inner })
    }

    pub fn environment(&self) -> &ContextEnvironment {
        &self.env
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn ConnectionFactory>, NamingError> {
        self.inner.lookup(name)
    }
}

impl Context for InitialContext {
    fn lookup(&self, name: &str) -> Result<Arc<dyn ConnectionFactory>, NamingError> {
        self.inner.lookup(name)
    }
}
