//! Transport-level errors shared by every broker implementation.

use std::io;

use thiserror::Error;

/// Error type for send and receive operations against a broker.
#[derive(Debug, Error)]
pub enum BusError {
    /// The destination name was empty.
    #[error("invalid destination: queue name must not be empty")]
    InvalidDestination,
    /// The broker could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The broker refused the supplied credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The broker answered with an error frame.
    #[error("rejected by broker: {0}")]
    Rejected(String),
    /// The broker sent something we could not make sense of.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// No answer within the configured I/O timeout.
    #[error("timed out waiting for the broker")]
    Timeout,
    /// The connection or session was already closed.
    #[error("connection closed")]
    Closed,
    /// Socket-level failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
