//! Forwarding payloads to a broker queue.

use std::sync::Arc;

use tracing::{error, info};

use super::error::ForwardError;
use crate::bus::Sender;

/// Sends payloads unchanged to named queues on one broker.
///
/// `target` names the broker or downstream service in logs and error text
/// ("Artemis", "Component 4").
#[derive(Clone)]
pub struct ForwardingService {
    sender: Arc<dyn Sender>,
    target: String,
}

impl ForwardingService {
    pub fn new(sender: Arc<dyn Sender>, target: impl Into<String>) -> Self {
        Self {
            sender,
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Forward a payload received from an upstream queue.
    pub fn forward(&self, destination: &str, payload: &str) -> Result<(), ForwardError> {
        info!(%destination, "Forwarding message to {} queue", self.target);
        info!(%payload, "Message content");

        match self.sender.send(destination, payload) {
            Ok(()) => {
                info!(%destination, "Message successfully forwarded to {} queue", self.target);
                Ok(())
            }
            Err(e) => {
                error!(%destination, error = %e, "Error forwarding message to {}", self.target);
                Err(ForwardError::new(
                    format!("Failed to forward message to {}", self.target),
                    destination,
                    e,
                ))
            }
        }
    }

    /// Send a payload submitted over HTTP.
    pub fn send(&self, destination: &str, payload: &str) -> Result<(), ForwardError> {
        info!(%destination, "Sending message to {} queue", self.target);
        info!(%payload, "Message content");

        match self.sender.send(destination, payload) {
            Ok(()) => {
                info!(%destination, "Message successfully sent to {} queue", self.target);
                Ok(())
            }
            Err(e) => {
                error!(%destination, error = %e, "Error sending message to {}", self.target);
                Err(ForwardError::new(
                    format!("Failed to send message to {}", self.target),
                    destination,
                    e,
                ))
            }
        }
    }
}
