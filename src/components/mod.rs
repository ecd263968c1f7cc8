//! The four relay services.
//!
//! | component | consumes | produces | HTTP |
//! |---|---|---|---|
//! | [`component1`] | legacy `weblogic.input.queue` (optional) | `component2.queue`, `component4.queue` | send + health |
//! | [`component2`] | `component2.queue` | – | health |
//! | [`component3`] | `component3-to-component4` | `component4.queue` | send + health |
//! | [`component4`] | `component4.queue` | – | health |
//!
//! Each module exposes its message handler, a `start` function taking the
//! connection factories explicitly and a `run` function that builds them
//! from [`Settings`].

pub mod component1;
pub mod component2;
pub mod component3;
pub mod component4;
mod terminal;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tracing::{info, warn};

use crate::bus::{BusError, ConnectionFactory};
use crate::config::Settings;
use crate::naming::NamingError;
use crate::relay::{ContainerHandle, ContainerStats};
use crate::stomp::StompConnectionFactory;

pub use terminal::TerminalHandler;

/// Failure while wiring a component.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("broker setup failed: {0}")]
    Bus(#[from] BusError),
    #[error("legacy broker lookup failed: {0}")]
    Naming(#[from] NamingError),
}

/// The Artemis connection factory described by `settings`.
pub fn artemis_factory(settings: &Settings) -> Result<Arc<dyn ConnectionFactory>, BusError> {
    let broker = &settings.artemis.broker;
    let factory = StompConnectionFactory::from_url(
        &broker.url,
        broker.credentials(),
        broker.connection_options(),
        broker.cache_size,
    )?;
    info!(broker = %factory.describe(), "Artemis connection factory configured");
    Ok(Arc::new(factory))
}

/// A started component: its listener containers and its HTTP routes.
pub struct Runtime {
    name: &'static str,
    router: Router,
    containers: Vec<ContainerHandle>,
}

impl Runtime {
    pub fn new(name: &'static str, router: Router, containers: Vec<ContainerHandle>) -> Self {
        Self {
            name,
            router,
            containers,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Routes to serve; clone to test without binding a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn containers(&self) -> &[ContainerHandle] {
        &self.containers
    }

    /// Stop every container and wait for its consumers.
    pub fn stop(self) -> Vec<(String, ContainerStats)> {
        self.containers
            .into_iter()
            .map(|handle| {
                let name = handle.name().to_string();
                let stats = handle.stop();
                info!(
                    container = %name,
                    handled = stats.handled,
                    failed = stats.failed,
                    polls = stats.polls,
                    peak_consumers = stats.peak_consumers,
                    "Listener stats"
                );
                (name, stats)
            })
            .collect()
    }

    /// Serve HTTP on `addr` until `shutdown` resolves, then stop the containers.
    pub async fn serve<F>(self, addr: &str, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(component = self.name, addr = %listener.local_addr()?, "HTTP server listening");

        let served = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(shutdown)
            .await;

        info!(component = self.name, "Shutting down");
        if tokio::task::spawn_blocking(move || self.stop()).await.is_err() {
            warn!("container shutdown panicked");
        }
        served
    }
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, shutting down");
    }
}
