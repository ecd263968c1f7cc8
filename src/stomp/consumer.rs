//! Queue consumers backed by dedicated connections.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use super::connection::Connection;
use super::frame::Frame;
use super::pool::CachingConnectionFactory;
use crate::bus::{validate_destination, BusError, Listener, ListenerSession, Message};

/// Opens one subscribed connection per session.
#[derive(Clone)]
pub struct StompListener {
    pool: Arc<CachingConnectionFactory>,
}

impl StompListener {
    pub fn new(pool: Arc<CachingConnectionFactory>) -> Self {
        Self { pool }
    }
}

impl Listener for StompListener {
    fn open(&self, queue: &str) -> Result<Box<dyn ListenerSession>, BusError> {
        validate_destination(queue)?;

        let mut connection = self.pool.open_dedicated()?;
        let subscription = format!("sub-{}", Uuid::new_v4());
        connection.subscribe(&subscription, queue)?;

        debug!(
            broker = %self.pool.address(),
            session = ?connection.session(),
            %queue,
            %subscription,
            "subscribed"
        );

        Ok(Box::new(StompSession {
            connection,
            subscription,
            queue: queue.to_string(),
        }))
    }
}

/// One subscription on one connection. Dropping it unsubscribes and
/// disconnects.
struct StompSession {
    connection: Connection,
    subscription: String,
    queue: String,
}

impl Drop for StompSession {
    fn drop(&mut self) {
        if self.connection.is_closed() {
            return;
        }
        if let Err(e) = self.connection.unsubscribe(&self.subscription) {
            debug!(subscription = %self.subscription, error = %e, "UNSUBSCRIBE failed");
        }
    }
}

impl ListenerSession for StompSession {
    fn receive(&mut self, timeout: Duration) -> Result<Option<Message>, BusError> {
        Ok(self
            .connection
            .receive(timeout)?
            .map(|frame| frame_to_message(frame, &self.queue)))
    }

    fn commit(&mut self, message: &Message) -> Result<(), BusError> {
        self.connection.ack(ack_id(message))
    }

    fn rollback(&mut self, message: &Message, reason: &str) -> Result<(), BusError> {
        debug!(message_id = %message.id, %reason, "returning message to broker");
        self.connection.nack(ack_id(message))
    }
}

/// The id ACK and NACK must carry: the MESSAGE `ack` header.
fn ack_id(message: &Message) -> &str {
    message
        .header("ack")
        .or_else(|| message.header("message-id"))
        .unwrap_or(&message.id)
}

pub(crate) fn frame_to_message(frame: Frame, queue: &str) -> Message {
    let id = frame
        .get("message-id")
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let destination = frame.get("destination").unwrap_or(queue).to_string();
    let payload = String::from_utf8_lossy(&frame.body).into_owned();

    let mut message = Message::with_id(id, destination, payload);
    message.headers = frame.headers;
    message
}
