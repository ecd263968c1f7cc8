use tracing::info;

use crate::bus::Message;
use crate::relay::{ListenerError, MessageHandler};

/// End of a relay chain: logs each message and acknowledges it.
#[derive(Clone, Debug)]
pub struct TerminalHandler {
    label: String,
    origin: String,
}

impl TerminalHandler {
    /// `label` names the component in logs ("Component 2"), `origin` says
    /// where messages come from ("Artemis (via Component 1)").
    pub fn new(label: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            origin: origin.into(),
        }
    }
}

impl MessageHandler for TerminalHandler {
    fn on_message(&self, message: &Message) -> Result<(), ListenerError> {
        info!("============================================");
        info!(
            "{}: Received message from {}",
            self.label.to_uppercase(),
            self.origin
        );
        info!(queue = %message.destination, "Queue: {}", message.destination);
        info!(payload = %message.payload, "Message: {}", message.payload);
        info!("Timestamp: {}", chrono::Utc::now().timestamp_millis());
        info!("============================================");

        info!("Processing message in {}...", self.label);
        info!("Message processed successfully");
        Ok(())
    }
}
