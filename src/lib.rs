//! Message relay services for ActiveMQ Artemis.
//!
//! Four small services pass text messages along broker queues:
//!
//! ```text
//! legacy queue ──► component-1 ──► component2.queue ──► component-2
//!                       │
//!                       └────────► component4.queue ──► component-4
//!                                        ▲
//! component3-to-component4 ──► component-3
//! ```
//!
//! - [`bus`]: message, sender/listener traits, in-memory broker
//! - [`stomp`]: STOMP 1.2 client used to reach Artemis
//! - [`naming`]: directory lookup of connection factories for the legacy bridge
//! - [`relay`]: forwarding, listener containers and HTTP ingress
//! - [`config`], [`logging`]: ambient setup shared by the binaries
//! - `components` (feature `http`): wiring of each service

pub mod bus;
pub mod config;
pub mod logging;
pub mod naming;
pub mod relay;
pub mod stomp;

#[cfg(feature = "http")]
pub mod components;

pub use bus::{BusError, ConnectionFactory, InMemoryBroker, Listener, ListenerSession, Message, Sender};
pub use relay::{ForwardError, ForwardingService, ListenerError};
