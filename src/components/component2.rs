//! Component-2: terminal consumer of `component2.queue`.

use std::sync::Arc;

use super::{artemis_factory, Runtime, StartError, TerminalHandler};
use crate::bus::ConnectionFactory;
use crate::config::Settings;
use crate::relay::{health_router, HealthInfo, ListenerContainer};

pub const COMPONENT: &str = "Component-2";

pub fn handler() -> TerminalHandler {
    TerminalHandler::new("Component 2", "Artemis")
}

pub fn start(settings: &Settings, artemis: Arc<dyn ConnectionFactory>) -> Runtime {
    let listener = &settings.artemis.listener;
    let container = ListenerContainer::start(
        "component2",
        &settings.artemis.queue.name,
        artemis.listener(),
        handler(),
        listener.container_options(listener.concurrency),
    );

    Runtime::new(
        COMPONENT,
        health_router(HealthInfo::new(COMPONENT)),
        vec![container],
    )
}

pub fn run(settings: &Settings) -> Result<Runtime, StartError> {
    Ok(start(settings, artemis_factory(settings)?))
}
