//! Bus: point-to-point messaging abstractions.
//!
//! This module provides the traits every broker implementation plugs into
//! and an in-memory broker for tests.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionFactory (per broker)               │
//! │  - sender()   → Arc<dyn Sender>                             │
//! │  - listener() → Arc<dyn Listener>                           │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Sender + Listener Traits                      │
//! │  Sender: send(queue, payload)                               │
//! │  Listener: open(queue) → ListenerSession                    │
//! │  ListenerSession: receive(timeout) / commit / rollback      │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                    │
//!          ▼                                    ▼
//! ┌─────────────────┐                ┌─────────────────────────┐
//! │ InMemoryBroker  │                │ StompConnectionFactory  │
//! │   (included)    │                │   (crate::stomp)        │
//! └─────────────────┘                └─────────────────────────┘
//! ```

mod error;
mod factory;
mod in_memory;
mod listener;
mod message;
mod sender;

pub use error::BusError;
pub use factory::ConnectionFactory;
pub use in_memory::InMemoryBroker;
pub use listener::{Listener, ListenerSession};
pub use message::Message;
pub use sender::{validate_destination, Sender};
