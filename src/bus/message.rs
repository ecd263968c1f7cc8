//! The message carried between queues.

use uuid::Uuid;

/// A text message addressed to a named queue.
///
/// The payload is opaque and travels byte-for-byte. `headers` holds
/// whatever the transport attached on delivery (`message-id`, `ack`,
/// `redelivered`, ...); applications never need to set any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Unique identifier for this message
    pub id: String,
    /// Queue the message was sent to or received from
    pub destination: String,
    /// Text payload
    pub payload: String,
    /// Transport headers, in arrival order
    pub headers: Vec<(String, String)>,
}

impl Message {
    /// Create a message with a fresh id.
    pub fn new(destination: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), destination, payload)
    }

    /// Create a message with a caller-supplied id.
    pub fn with_id(
        id: impl Into<String>,
        destination: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            destination: destination.into(),
            payload: payload.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header to the message.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of the named header, if any.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the broker flagged this delivery as a redelivery.
    pub fn is_redelivered(&self) -> bool {
        self.header("redelivered") == Some("true")
    }
}
