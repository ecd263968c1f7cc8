//! Context factory for STOMP endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::context::{Context, ContextEnvironment, ContextFactory};
use super::error::NamingError;
use crate::bus::ConnectionFactory;
use crate::stomp::{BrokerAddress, ConnectionOptions, Credentials, StompConnectionFactory};

/// Full name of [`StompContextFactory`], usable as `initial_context_factory`.
pub const STOMP_CONTEXT_FACTORY: &str = "artemis_relay.naming.StompContextFactory";

/// Treats the provider URL as a STOMP broker.
///
/// Every bound name resolves to the same [`StompConnectionFactory`] for the
/// provider URL, authenticated with the environment's principal and
/// credentials. No connection is opened until the factory is used.
#[derive(Clone, Debug)]
pub struct StompContextFactory {
    names: BTreeSet<String>,
    options: ConnectionOptions,
    cache_size: usize,
}

impl StompContextFactory {
    pub fn new(options: ConnectionOptions, cache_size: usize) -> Self {
        Self {
            names: BTreeSet::new(),
            options,
            cache_size,
        }
    }

    /// Make `name` resolvable in contexts created from now on.
    pub fn bind(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }
}

impl Default for StompContextFactory {
    fn default() -> Self {
        Self::new(ConnectionOptions::default(), 10).bind("jms/ConnectionFactory")
    }
}

impl ContextFactory for StompContextFactory {
    fn create(&self, env: &ContextEnvironment) -> Result<Box<dyn Context>, NamingError> {
        if env.provider_url.trim().is_empty() {
            return Err(NamingError::InvalidEnvironment(
                "provider url is empty".to_string(),
            ));
        }
        let address = BrokerAddress::parse(&env.provider_url)
            .map_err(|e| NamingError::InvalidEnvironment(e.to_string()))?;

        let credentials = Credentials {
            login: env.security_principal.clone(),
            passcode: env.security_credentials.clone(),
        };
        let factory: Arc<dyn ConnectionFactory> = Arc::new(StompConnectionFactory::new(
            address,
            credentials,
            self.options.clone(),
            self.cache_size,
        ));

        Ok(Box::new(StompContext {
            names: self.names.clone(),
            factory,
        }))
    }
}

struct StompContext {
    names: BTreeSet<String>,
    factory: Arc<dyn ConnectionFactory>,
}

impl Context for StompContext {
    fn lookup(&self, name: &str) -> Result<Arc<dyn ConnectionFactory>, NamingError> {
        if self.names.contains(name) {
            Ok(Arc::clone(&self.factory))
        } else {
            Err(NamingError::NameNotFound(name.to_string()))
        }
    }
}
