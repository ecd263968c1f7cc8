//! Transacted sending over pooled connections.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::pool::CachingConnectionFactory;
use crate::bus::{validate_destination, BusError, Sender};

/// A [`Sender`] that wraps every send in its own broker transaction.
///
/// Each call runs `BEGIN`, a persistent `SEND` bound to the transaction and
/// `COMMIT`, waiting for a receipt at every step. If the send or the commit
/// fails the transaction is aborted when the connection still allows it.
#[derive(Clone)]
pub struct StompTemplate {
    pool: Arc<CachingConnectionFactory>,
}

impl StompTemplate {
    pub fn new(pool: Arc<CachingConnectionFactory>) -> Self {
        Self { pool }
    }
}

impl Sender for StompTemplate {
    fn send(&self, destination: &str, payload: &str) -> Result<(), BusError> {
        validate_destination(destination)?;

        let transaction = format!("tx-{}", Uuid::new_v4());

        self.pool.with_connection(|connection| {
            connection.begin(&transaction)?;

            let outcome = match connection.send(destination, payload, Some(transaction.as_str())) {
                Ok(()) => connection.commit(&transaction),
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                if !connection.is_closed() {
                    if let Err(abort_error) = connection.abort(&transaction) {
                        warn!(%transaction, error = %abort_error, "failed to abort transaction");
                    }
                }
                return Err(e);
            }
            Ok(())
        })?;

        debug!(%destination, %transaction, "committed send");
        Ok(())
    }
}
