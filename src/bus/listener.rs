//! Listener traits for point-to-point messaging.

use std::time::Duration;

use super::error::BusError;
use super::message::Message;

/// Opens consumer sessions on named queues.
///
/// Listeners compete on a queue: each message is delivered to exactly one
/// open session.
pub trait Listener: Send + Sync {
    /// Open a session bound to `queue`.
    fn open(&self, queue: &str) -> Result<Box<dyn ListenerSession>, BusError>;
}

/// One consumer attached to one queue.
///
/// Received messages stay unacknowledged until `commit` or `rollback` is
/// called for them.
pub trait ListenerSession: Send {
    /// Wait up to `timeout` for the next message.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Message>, BusError>;

    /// Acknowledge a message received on this session.
    fn commit(&mut self, message: &Message) -> Result<(), BusError>;

    /// Hand a message back to the broker for redelivery.
    fn rollback(&mut self, message: &Message, reason: &str) -> Result<(), BusError>;
}
