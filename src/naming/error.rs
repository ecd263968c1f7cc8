use thiserror::Error;

use crate::bus::BusError;

/// Errors raised while building a naming context or looking up a name.
#[derive(Debug, Error)]
pub enum NamingError {
    /// The initial-context factory is missing or not registered.
    #[error("cannot instantiate initial context factory {0:?}")]
    NoInitialContext(String),
    /// Nothing is bound under the requested name.
    #[error("name not found: {0}")]
    NameNotFound(String),
    /// The environment is incomplete or malformed.
    #[error("invalid naming environment: {0}")]
    InvalidEnvironment(String),
    #[error(transparent)]
    Bus(#[from] BusError),
}
