//! Sender trait for point-to-point messaging.

use super::error::BusError;

/// Trait for sending a text payload to a named queue.
///
/// Each call is a unit of work of its own: implementations commit the
/// send before returning and never group it with other calls.
pub trait Sender: Send + Sync {
    /// Send `payload` to the queue named `destination`.
    fn send(&self, destination: &str, payload: &str) -> Result<(), BusError>;
}

/// Reject empty destination names before touching the broker.
pub fn validate_destination(destination: &str) -> Result<(), BusError> {
    if destination.trim().is_empty() {
        Err(BusError::InvalidDestination)
    } else {
        Ok(())
    }
}
