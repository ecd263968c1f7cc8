//! Component-3: consumes `component3-to-component4`, prefixes each payload
//! and forwards it to the output queue. HTTP sends go to the same queue
//! without the prefix.

use std::sync::Arc;

use tracing::info;

use super::{artemis_factory, Runtime, StartError};
use crate::bus::{ConnectionFactory, Message};
use crate::config::Settings;
use crate::relay::{
    router, ForwardingService, HealthInfo, ListenerContainer, ListenerError, MessageApi,
    MessageHandler, QueueRouting,
};

pub const COMPONENT: &str = "Component 3 - Producer/Consumer Service";

/// Marker put in front of every payload this component forwards.
pub const PROCESSED_PREFIX: &str = "Processed by Component 3: ";

pub fn process(payload: &str) -> String {
    format!("{}{}", PROCESSED_PREFIX, payload)
}

/// Prefixes and forwards each message to `output_queue`.
#[derive(Clone)]
pub struct ProcessorHandler {
    forwarding: ForwardingService,
    output_queue: String,
}

impl ProcessorHandler {
    pub fn new(forwarding: ForwardingService, output_queue: impl Into<String>) -> Self {
        Self {
            forwarding,
            output_queue: output_queue.into(),
        }
    }
}

impl MessageHandler for ProcessorHandler {
    fn on_message(&self, message: &Message) -> Result<(), ListenerError> {
        info!("============================================");
        info!("COMPONENT 3: Received message from Artemis");
        info!("Queue: {}", message.destination);
        info!("Message: {}", message.payload);
        info!("Timestamp: {}", chrono::Utc::now().timestamp_millis());
        info!("============================================");

        info!("Processing message in Component 3...");
        let processed = process(&message.payload);

        info!("Forwarding message to Component 4 queue...");
        self.forwarding.forward(&self.output_queue, &processed)?;

        info!("Message processed and forwarded successfully");
        Ok(())
    }
}

pub fn message_api(forwarding: ForwardingService, output_queue: &str) -> MessageApi {
    MessageApi::new(
        forwarding,
        QueueRouting::Fixed {
            queue: output_queue.to_string(),
        },
        HealthInfo::new(COMPONENT),
        "Message sent to Component 4 queue successfully",
    )
}

pub fn start(settings: &Settings, artemis: Arc<dyn ConnectionFactory>) -> Runtime {
    let queues = &settings.artemis.queue;
    let listener = &settings.artemis.listener;
    let forwarding = ForwardingService::new(artemis.sender(), "Component 4");

    let container = ListenerContainer::start(
        "component3",
        &queues.input,
        artemis.listener(),
        ProcessorHandler::new(forwarding.clone(), &queues.output),
        listener.container_options(listener.concurrency),
    );

    let api = Arc::new(message_api(forwarding, &queues.output));
    Runtime::new("Component-3", router(api), vec![container])
}

pub fn run(settings: &Settings) -> Result<Runtime, StartError> {
    Ok(start(settings, artemis_factory(settings)?))
}
