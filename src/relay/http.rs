//! HTTP ingress: maps HTTP requests to broker sends.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /api/messages/send`: body is the raw text payload (any content type).
//!   With [`QueueRouting::Selectable`] the `queue` query parameter picks the
//!   destination.
//! - `GET /api/messages/health`: static liveness payload, always 200. The
//!   broker is not contacted.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use artemis_relay::relay::{HealthInfo, MessageApi, QueueRouting};
//!
//! let api = Arc::new(MessageApi::new(
//!     forwarding,
//!     QueueRouting::Selectable { default_queue: "component2.queue".into() },
//!     HealthInfo::new("Component-1").with_description("WebLogic to Artemis Adapter"),
//!     "Message sent successfully",
//! ));
//!
//! // Get the router to compose with other axum routes
//! let app = relay::router(api.clone());
//!
//! // Or serve directly
//! relay::serve(api, "0.0.0.0:8081").await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::forwarding::ForwardingService;

/// How the destination of `POST /api/messages/send` is chosen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueRouting {
    /// `?queue=` picks the queue; a missing or blank value means
    /// `default_queue`.
    Selectable { default_queue: String },
    /// Always `queue`; the query parameter is ignored.
    Fixed { queue: String },
}

impl QueueRouting {
    pub fn resolve(&self, requested: Option<String>) -> String {
        match self {
            QueueRouting::Selectable { default_queue } => requested
                .filter(|queue| !queue.trim().is_empty())
                .unwrap_or_else(|| default_queue.clone()),
            QueueRouting::Fixed { queue } => queue.clone(),
        }
    }
}

/// Body of `GET /api/messages/health`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct HealthInfo {
    pub status: String,
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HealthInfo {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            status: "UP".to_string(),
            component: component.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// State shared by the message routes.
pub struct MessageApi {
    forwarding: ForwardingService,
    routing: QueueRouting,
    health: HealthInfo,
    success_message: String,
}

impl MessageApi {
    pub fn new(
        forwarding: ForwardingService,
        routing: QueueRouting,
        health: HealthInfo,
        success_message: impl Into<String>,
    ) -> Self {
        Self {
            forwarding,
            routing,
            health,
            success_message: success_message.into(),
        }
    }
}

/// Body of every `POST /api/messages/send` response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResponse {
    pub status: String,
    pub message: String,
    pub queue: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl SendResponse {
    fn new(status: &str, message: String, queue: String) -> Self {
        Self {
            status: status.to_string(),
            message,
            queue,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendParams {
    queue: Option<String>,
}

/// Build an axum `Router` serving the message routes.
pub fn router(api: Arc<MessageApi>) -> Router {
    Router::new()
        .route("/api/messages/send", post(send_handler))
        .route("/api/messages/health", get(health_handler))
        .with_state(api)
}

/// A router with only `GET /api/messages/health`, for components without
/// HTTP ingress.
pub fn health_router(health: HealthInfo) -> Router {
    Router::new().route(
        "/api/messages/health",
        get(move || {
            let health = health.clone();
            async move { Json(health) }
        }),
    )
}

/// Serve the message routes at the given address (e.g. `"0.0.0.0:8081"`).
pub async fn serve(api: Arc<MessageApi>, addr: &str) -> Result<(), std::io::Error> {
    serve_until(api, addr, std::future::pending()).await
}

/// Like [`serve`], finishing once `shutdown` resolves.
pub async fn serve_until<F>(
    api: Arc<MessageApi>,
    addr: &str,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(api);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// `POST /api/messages/send`
async fn send_handler(
    State(api): State<Arc<MessageApi>>,
    Query(params): Query<SendParams>,
    body: String,
) -> impl IntoResponse {
    let queue = api.routing.resolve(params.queue);
    info!(
        %queue,
        target = api.forwarding.target(),
        "Received REST request to send message to queue"
    );
    info!(payload = %body, "Message payload");

    let forwarding = api.forwarding.clone();
    let destination = queue.clone();
    let result = tokio::task::spawn_blocking(move || forwarding.send(&destination, &body)).await;

    let cause = match result {
        Ok(Ok(())) => {
            let body = SendResponse::new("success", api.success_message.clone(), queue);
            return (StatusCode::OK, Json(body));
        }
        Ok(Err(e)) => e.to_string(),
        Err(join_error) => join_error.to_string(),
    };

    error!(%queue, error = %cause, "Error sending message");
    let body = SendResponse::new("error", format!("Failed to send message: {}", cause), queue);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
}

/// `GET /api/messages/health`
async fn health_handler(State(api): State<Arc<MessageApi>>) -> impl IntoResponse {
    Json(api.health.clone())
}
