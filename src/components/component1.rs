//! Component-1: legacy broker bridge and HTTP ingress.
//!
//! When `weblogic.jms.url` is set, the legacy connection factory is looked
//! up by name through an [`InitialContext`] and the legacy input queue is
//! bridged to both `component2.queue` and `component4.queue` on Artemis.
//! Without it the component only serves HTTP.

use std::sync::Arc;

use tracing::{error, info};

use super::{artemis_factory, Runtime, StartError};
use crate::bus::{ConnectionFactory, Message};
use crate::config::Settings;
use crate::naming::{
    ContextFactoryRegistry, InitialContext, StompContextFactory, STOMP_CONTEXT_FACTORY,
};
use crate::relay::{
    router, ForwardingService, HealthInfo, ListenerContainer, ListenerError, MessageApi,
    MessageHandler, QueueRouting,
};

pub const COMPONENT: &str = "Component-1";
pub const DESCRIPTION: &str = "WebLogic to Artemis Adapter";

/// Forwards each legacy message unchanged to every destination, in order.
///
/// The sends are independent. If a later one fails, earlier destinations
/// keep their copy and the message is rolled back, so a redelivery sends
/// them a duplicate.
#[derive(Clone)]
pub struct BridgeHandler {
    forwarding: ForwardingService,
    destinations: Vec<String>,
}

impl BridgeHandler {
    pub fn new(forwarding: ForwardingService, destinations: Vec<String>) -> Self {
        Self {
            forwarding,
            destinations,
        }
    }
}

impl MessageHandler for BridgeHandler {
    fn on_message(&self, message: &Message) -> Result<(), ListenerError> {
        info!("============================================");
        info!("Received message from WebLogic queue");
        info!("Message: {}", message.payload);
        info!("============================================");

        for destination in &self.destinations {
            if let Err(e) = self.forwarding.forward(destination, &message.payload) {
                error!(error = %e, "Error processing message from WebLogic");
                return Err(e.into());
            }
        }

        info!("Message successfully processed and forwarded");
        Ok(())
    }
}

pub fn message_api(forwarding: ForwardingService, default_queue: &str) -> MessageApi {
    MessageApi::new(
        forwarding,
        QueueRouting::Selectable {
            default_queue: default_queue.to_string(),
        },
        HealthInfo::new(COMPONENT).with_description(DESCRIPTION),
        "Message sent successfully",
    )
}

/// Context factories available to the bridge: the STOMP factory under
/// `stomp` and its full name, with the configured connection-factory name
/// bound.
pub fn default_registry(settings: &Settings) -> ContextFactoryRegistry {
    let broker = &settings.artemis.broker;
    let factory = Arc::new(
        StompContextFactory::new(broker.connection_options(), broker.cache_size)
            .bind(settings.weblogic.jms.connection_factory.clone()),
    );

    let mut registry = ContextFactoryRegistry::new();
    registry
        .register("stomp", factory.clone())
        .register(STOMP_CONTEXT_FACTORY, factory);
    registry
}

/// Look up the legacy connection factory, or `None` if the bridge is off.
pub fn legacy_factory(
    settings: &Settings,
    registry: &ContextFactoryRegistry,
) -> Result<Option<Arc<dyn ConnectionFactory>>, StartError> {
    let jms = &settings.weblogic.jms;
    let Some(env) = jms.context_environment() else {
        return Ok(None);
    };

    let context = InitialContext::new(env, registry)?;
    let factory = context.lookup(&jms.connection_factory)?;
    info!(
        name = %jms.connection_factory,
        factory = %factory.describe(),
        "Legacy connection factory resolved"
    );
    Ok(Some(factory))
}

pub fn start(
    settings: &Settings,
    artemis: Arc<dyn ConnectionFactory>,
    registry: &ContextFactoryRegistry,
) -> Result<Runtime, StartError> {
    let forwarding = ForwardingService::new(artemis.sender(), "Artemis");
    let queues = &settings.artemis.queue;

    let mut containers = Vec::new();
    match legacy_factory(settings, registry)? {
        Some(legacy) => {
            let handler = BridgeHandler::new(
                forwarding.clone(),
                vec![queues.component2.clone(), queues.component4.clone()],
            );
            let options = settings
                .artemis
                .listener
                .container_options(settings.weblogic.listener.concurrency);
            containers.push(ListenerContainer::start(
                "weblogic-bridge",
                &settings.weblogic.queue.input,
                legacy.listener(),
                handler,
                options,
            ));
        }
        None => info!("weblogic.jms.url not set, legacy bridge disabled"),
    }

    let api = Arc::new(message_api(forwarding, &queues.component2));
    Ok(Runtime::new(COMPONENT, router(api), containers))
}

pub fn run(settings: &Settings) -> Result<Runtime, StartError> {
    start(settings, artemis_factory(settings)?, &default_registry(settings))
}
