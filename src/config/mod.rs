//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults (per component)
//! 2. `config/default.*` and `config/<component>.*`, both optional
//! 3. environment variables `RELAY__<SECTION>__<KEY>`, e.g.
//!    `RELAY__ARTEMIS__BROKER__URL=tcp://artemis:61613`

mod settings;

use std::fmt;
use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};

pub use settings::{
    ArtemisSettings, BrokerSettings, ListenerSettings, LoggingSettings, QueueSettings,
    ServerSettings, Settings, WebLogicJmsSettings, WebLogicListenerSettings,
    WebLogicQueueSettings,
};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "RELAY";

/// The four relay services.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    One,
    Two,
    Three,
    Four,
}

impl Component {
    /// Name used for config files and logs, e.g. `component-1`.
    pub fn name(&self) -> &'static str {
        match self {
            Component::One => "component-1",
            Component::Two => "component-2",
            Component::Three => "component-3",
            Component::Four => "component-4",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Component::One => 8081,
            Component::Two => 8082,
            Component::Three => 8083,
            Component::Four => 8084,
        }
    }

    /// Queue a terminal consumer listens on by default.
    fn default_listen_queue(&self) -> &'static str {
        match self {
            Component::Four => "component4.queue",
            _ => "component2.queue",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Load settings for `component` from `./config` and the environment.
pub fn load_config(component: Component) -> Result<Settings, ConfigError> {
    load_config_from(component, Path::new("config"))
}

/// Load settings for `component` with config files taken from `dir`.
pub fn load_config_from(component: Component, dir: &Path) -> Result<Settings, ConfigError> {
    let default_file = dir.join("default");
    let component_file = dir.join(component.name());

    let config = with_defaults(Config::builder(), component)?
        .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
        .add_source(File::with_name(&component_file.to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    config.try_deserialize()
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
    component: Component,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", i64::from(component.default_port()))?
        .set_default("artemis.broker.url", "tcp://localhost:61613")?
        .set_default("artemis.broker.user", "admin")?
        .set_default("artemis.broker.password", "admin")?
        .set_default("artemis.broker.connect_timeout_ms", 5000)?
        .set_default("artemis.broker.io_timeout_ms", 10000)?
        .set_default("artemis.broker.heartbeat_ms", 10000)?
        .set_default("artemis.broker.cache_size", 10)?
        .set_default("artemis.listener.concurrency", "5")?
        .set_default("artemis.listener.receive_timeout_ms", 1000)?
        .set_default("artemis.listener.recovery_interval_ms", 5000)?
        .set_default("artemis.queue.name", component.default_listen_queue())?
        .set_default("artemis.queue.input", "component3-to-component4")?
        .set_default("artemis.queue.output", "component4.queue")?
        .set_default("artemis.queue.component2", "component2.queue")?
        .set_default("artemis.queue.component4", "component4.queue")?
        .set_default("weblogic.jms.initial_context_factory", "stomp")?
        .set_default("weblogic.jms.connection_factory", "jms/ConnectionFactory")?
        .set_default("weblogic.queue.input", "weblogic.input.queue")?
        .set_default("weblogic.listener.concurrency", "3-10")?
        .set_default("logging.level", "info")
}
