//! HTTP ingress tests.
//!
//! Starts an axum server and exercises it with reqwest.

use std::sync::Arc;

use artemis_relay::bus::InMemoryBroker;
use artemis_relay::components::{component1, component3};
use artemis_relay::relay::{self, ForwardingService, MessageApi, SendResponse};
use serde_json::Value;

/// Bind to port 0 and return the actual address.
async fn start_server(api: MessageApi) -> String {
    let app = relay::router(Arc::new(api));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn component1_server(broker: &InMemoryBroker) -> String {
    let forwarding = ForwardingService::new(Arc::new(broker.clone()), "Artemis");
    start_server(component1::message_api(forwarding, "component2.queue")).await
}

async fn component3_server(broker: &InMemoryBroker) -> String {
    let forwarding = ForwardingService::new(Arc::new(broker.clone()), "Component 4");
    start_server(component3::message_api(forwarding, "component4.queue")).await
}

#[tokio::test]
async fn send_defaults_to_component2_queue() {
    let broker = InMemoryBroker::new();
    let base = component1_server(&broker).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/messages/send"))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: SendResponse = resp.json().await.unwrap();
    assert_eq!(body.status, "success");
    assert_eq!(body.queue, "component2.queue");
    assert_eq!(body.message, "Message sent successfully");
    assert!(body.timestamp > 0);

    assert_eq!(broker.sent_to("component2.queue"), vec!["hello".to_string()]);
}

#[tokio::test]
async fn queue_parameter_selects_destination() {
    let broker = InMemoryBroker::new();
    let base = component1_server(&broker).await;
    let xml = "<order><id>42</id></order>";

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/messages/send?queue=component4.queue"))
        .header("content-type", "application/xml")
        .body(xml)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["queue"], "component4.queue");
    assert_eq!(broker.sent_to("component4.queue"), vec![xml.to_string()]);
    assert!(broker.sent_to("component2.queue").is_empty());
}

#[tokio::test]
async fn broker_failure_yields_500() {
    let broker = InMemoryBroker::new();
    broker.fail_sends("connection refused");
    let base = component1_server(&broker).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/messages/send"))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let body: SendResponse = resp.json().await.unwrap();
    assert_eq!(body.status, "error");
    assert_eq!(body.queue, "component2.queue");
    assert!(body.message.starts_with("Failed to send message: "));
    assert!(body.message.contains("connection refused"));
}

#[tokio::test]
async fn blank_queue_parameter_uses_default_queue() {
    let broker = InMemoryBroker::new();
    let base = component1_server(&broker).await;

    for query in ["?queue=", "?queue=%20%20"] {
        let resp = reqwest::Client::new()
            .post(format!("{base}/api/messages/send{query}"))
            .body("hello")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: SendResponse = resp.json().await.unwrap();
        assert_eq!(body.status, "success");
        assert_eq!(body.queue, "component2.queue");
    }

    assert_eq!(
        broker.sent_to("component2.queue"),
        vec!["hello".to_string(), "hello".to_string()]
    );
    assert_eq!(broker.sent().len(), 2);
}

#[tokio::test]
async fn health_is_up_even_when_broker_is_down() {
    let broker = InMemoryBroker::new();
    broker.fail_sends("down");
    let base = component1_server(&broker).await;

    let resp = reqwest::get(format!("{base}/api/messages/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "status": "UP",
            "component": "Component-1",
            "description": "WebLogic to Artemis Adapter"
        })
    );
}

#[tokio::test]
async fn component3_sends_raw_payload_to_fixed_queue() {
    let broker = InMemoryBroker::new();
    let base = component3_server(&broker).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/messages/send?queue=elsewhere"))
        .body("raw")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: SendResponse = resp.json().await.unwrap();
    assert_eq!(body.message, "Message sent to Component 4 queue successfully");
    assert_eq!(body.queue, "component4.queue");
    assert_eq!(broker.sent_to("component4.queue"), vec!["raw".to_string()]);
    assert!(broker.sent_to("elsewhere").is_empty());

    let health: Value = reqwest::get(format!("{base}/api/messages/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["component"], "Component 3 - Producer/Consumer Service");
    assert!(health.get("description").is_none());
}

#[tokio::test]
async fn component3_broker_failure_yields_500() {
    let broker = InMemoryBroker::new();
    broker.fail_sends_to("component4.queue", "AMQ219010: connection timed out");
    let base = component3_server(&broker).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/messages/send"))
        .body("raw")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let body: SendResponse = resp.json().await.unwrap();
    assert_eq!(body.status, "error");
    assert_eq!(body.queue, "component4.queue");
    assert!(body.message.starts_with("Failed to send message: "));
    assert!(body.message.contains("Component 4"));
    assert!(body.message.contains("AMQ219010"));
    assert!(broker.sent().is_empty());
}
