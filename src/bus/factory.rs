//! Connection factory abstraction.

use std::sync::Arc;

use super::listener::Listener;
use super::sender::Sender;

/// Entry point to one broker: hands out a shared sender and a listener.
///
/// The relay never talks to a broker except through a factory, so the
/// primary broker, a legacy broker found through a naming lookup and the
/// in-memory broker used in tests are interchangeable.
pub trait ConnectionFactory: Send + Sync {
    /// A thread-safe sender backed by this broker.
    fn sender(&self) -> Arc<dyn Sender>;

    /// A listener that opens consumer sessions on this broker.
    fn listener(&self) -> Arc<dyn Listener>;

    /// Human-readable description for logs (never includes credentials).
    fn describe(&self) -> String;
}
