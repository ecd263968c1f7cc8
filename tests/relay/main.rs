//! Relay integration tests.


mod container;
mod naming;
mod stomp;

#[cfg(feature = "http")]
mod http;
