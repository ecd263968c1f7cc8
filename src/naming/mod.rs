//! Directory lookup of connection factories.
//!
//! A legacy broker is reached through an [`InitialContext`] configured by
//! the name of an initial-context factory and a provider URL. The context
//! resolves a connection-factory name (e.g. `jms/ConnectionFactory`) to a
//! [`ConnectionFactory`](crate::bus::ConnectionFactory).
//!
//! ```text
//! ContextEnvironment ──► ContextFactoryRegistry ──► ContextFactory::create
//!                                                        │
//!                                                        ▼
//!                          InitialContext::lookup(name) ──► Arc<dyn ConnectionFactory>
//! ```
//!
//! Two factories are included:
//! - [`StompContextFactory`]: the provider URL is a STOMP endpoint
//! - [`InMemoryContextFactory`]: explicit bindings, for tests and embedding

mod context;
mod error;
mod in_memory;
mod stomp;

pub use context::{
    Context, ContextEnvironment, ContextFactory, ContextFactoryRegistry, InitialContext,
};
pub use error::NamingError;
pub use in_memory::InMemoryContextFactory;
pub use stomp::{StompContextFactory, STOMP_CONTEXT_FACTORY};
