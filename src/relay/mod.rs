//! Relay building blocks shared by every component.
//!
//! - [`ForwardingService`]: send a payload verbatim to a queue
//! - [`ListenerContainer`]: consumer threads that hand messages to a
//!   [`MessageHandler`] and commit or roll back based on its result
//! - `http` (feature `http`): `POST /api/messages/send` and
//!   `GET /api/messages/health`

mod container;
mod error;
mod forwarding;
#[cfg(feature = "http")]
mod http;

pub use container::{
    Concurrency, ContainerHandle, ContainerOptions, ContainerStats, InvalidConcurrency,
    ListenerContainer, MessageHandler,
};
pub use error::{ForwardError, ListenerError};
pub use forwarding::ForwardingService;
#[cfg(feature = "http")]
pub use http::{
    health_router, router, serve, serve_until, HealthInfo, MessageApi, QueueRouting, SendResponse,
};
