//! Error types for forwarding and listener callbacks.

use thiserror::Error;

use crate::bus::BusError;

/// A send to the broker failed.
///
/// `context` is the caller-facing summary (e.g. "Failed to forward message
/// to Artemis"); `source` keeps the transport cause.
#[derive(Debug, Error)]
#[error("{context}: {source}")]
pub struct ForwardError {
    pub context: String,
    pub destination: String,
    #[source]
    pub source: BusError,
}

impl ForwardError {
    pub fn new(context: impl Into<String>, destination: impl Into<String>, source: BusError) -> Self {
        Self {
            context: context.into(),
            destination: destination.into(),
            source,
        }
    }
}

/// Failure reported by a message handler. The message is rolled back.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error(transparent)]
    Forward(#[from] ForwardError),
    #[error("{0}")]
    Handler(String),
    #[error("handler panicked: {0}")]
    Panicked(String),
}
