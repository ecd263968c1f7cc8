//! STOMP 1.2 client for ActiveMQ Artemis.
//!
//! Artemis accepts STOMP on its acceptors (port 61613 by default). Queues are
//! addressed by their plain anycast address name, e.g. `component2.queue`.
//!
//! - [`frame`]: wire encoding
//! - [`Connection`]: one blocking connection with receipt-confirmed commands
//! - [`CachingConnectionFactory`]: reusable producer connections
//! - [`StompTemplate`]: transacted, persistent [`Sender`](crate::bus::Sender)
//! - [`StompListener`]: [`Listener`](crate::bus::Listener) with one
//!   subscription per session, ACK on commit and NACK on rollback
//!
//! ```no_run
//! use artemis_relay::bus::{ConnectionFactory, Sender};
//! use artemis_relay::stomp::{ConnectionOptions, Credentials, StompConnectionFactory};
//!
//! let factory = StompConnectionFactory::from_url(
//!     "tcp://localhost:61613",
//!     Credentials::new("admin", "admin"),
//!     ConnectionOptions::default(),
//!     10,
//! )?;
//! factory.sender().send("component2.queue", "hello")?;
//! # Ok::<(), artemis_relay::bus::BusError>(())
//! ```

pub mod frame;

mod connection;
mod consumer;
mod pool;
mod template;
mod url;

use std::sync::Arc;

pub use connection::{Connection, ConnectionOptions, Credentials};
pub use consumer::StompListener;
pub use pool::CachingConnectionFactory;
pub use template::StompTemplate;
pub use url::{BrokerAddress, DEFAULT_PORT};

use crate::bus::{BusError, ConnectionFactory, Listener, Sender};

/// [`ConnectionFactory`] for a STOMP broker.
pub struct StompConnectionFactory {
    pool: Arc<CachingConnectionFactory>,
    sender: Arc<StompTemplate>,
    listener: Arc<StompListener>,
}

impl StompConnectionFactory {
    pub fn new(
        address: BrokerAddress,
        credentials: Credentials,
        options: ConnectionOptions,
        cache_size: usize,
    ) -> Self {
        let pool = Arc::new(CachingConnectionFactory::new(
            address,
            credentials,
            options,
            cache_size,
        ));
        Self {
            sender: Arc::new(StompTemplate::new(Arc::clone(&pool))),
            listener: Arc::new(StompListener::new(Arc::clone(&pool))),
            pool,
        }
    }

    /// Same as [`new`](Self::new) with the address parsed from a broker URL.
    pub fn from_url(
        url: &str,
        credentials: Credentials,
        options: ConnectionOptions,
        cache_size: usize,
    ) -> Result<Self, BusError> {
        Ok(Self::new(
            BrokerAddress::parse(url)?,
            credentials,
            options,
            cache_size,
        ))
    }

    pub fn pool(&self) -> &Arc<CachingConnectionFactory> {
        &self.pool
    }
}

impl ConnectionFactory for StompConnectionFactory {
    fn sender(&self) -> Arc<dyn Sender> {
        self.sender.clone()
    }

    fn listener(&self) -> Arc<dyn Listener> {
        self.listener.clone()
    }

    fn describe(&self) -> String {
        let user = self
            .pool
            .credentials()
            .login
            .as_deref()
            .unwrap_or("anonymous");
        format!("stomp://{} as {}", self.pool.address(), user)
    }
}
