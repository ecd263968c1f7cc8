//! Connection caching for producers.

use parking_lot::Mutex;
use tracing::debug;

use super::connection::{Connection, ConnectionOptions, Credentials};
use super::url::BrokerAddress;
use crate::bus::BusError;

/// Keeps up to `cache_size` idle connections to one broker for reuse.
///
/// Connections are lent out for the duration of one operation. A
/// connection that failed while lent out is discarded instead of cached.
/// Idle connections send no heart-beats, so each one is checked at
/// checkout and replaced when the broker has closed it.
pub struct CachingConnectionFactory {
    address: BrokerAddress,
    credentials: Credentials,
    options: ConnectionOptions,
    cache_size: usize,
    idle: Mutex<Vec<Connection>>,
}

impl CachingConnectionFactory {
    pub fn new(
        address: BrokerAddress,
        credentials: Credentials,
        options: ConnectionOptions,
        cache_size: usize,
    ) -> Self {
        Self {
            address,
            credentials,
            options,
            cache_size,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> &BrokerAddress {
        &self.address
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Open a connection that bypasses the cache (used by consumers).
    pub fn open_dedicated(&self) -> Result<Connection, BusError> {
        Connection::open(&self.address, &self.credentials, &self.options)
    }

    /// Run `operation` on a cached connection, opening one if none is idle.
    ///
    /// The connection goes back to the cache afterwards unless it was
    /// closed during the operation.
    pub fn with_connection<T>(
        &self,
        operation: impl FnOnce(&mut Connection) -> Result<T, BusError>,
    ) -> Result<T, BusError> {
        let mut connection = self.checkout()?;
        let result = operation(&mut connection);
        self.checkin(connection);
        result
    }

    fn checkout(&self) -> Result<Connection, BusError> {
        // The broker may have dropped an idle connection (TTL, restart).
        let cached = {
            let mut idle = self.idle.lock();
            let mut found = None;
            while let Some(mut connection) = idle.pop() {
                if connection.is_alive() {
                    found = Some(connection);
                    break;
                }
                debug!(broker = %self.address, "discarding stale cached connection");
            }
            found
        };

        match cached {
            Some(connection) => Ok(connection),
            None => {
                debug!(broker = %self.address, "opening new cached connection");
                self.open_dedicated()
            }
        }
    }

    /// Number of connections waiting in the cache.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    fn checkin(&self, connection: Connection) {
        if connection.is_closed() {
            debug!(broker = %self.address, "discarding broken connection");
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.cache_size {
            idle.push(connection);
        }
        // Over the limit: dropping the connection disconnects it.
    }
}
