use std::time::Duration;

use serde::Deserialize;

use crate::naming::ContextEnvironment;
use crate::relay::{Concurrency, ContainerOptions};
use crate::stomp::{ConnectionOptions, Credentials};

/// Settings for one component.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub artemis: ArtemisSettings,
    pub weblogic: WebLogicSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    /// `host:port` to bind the HTTP server to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtemisSettings {
    pub broker: BrokerSettings,
    pub listener: ListenerSettings,
    pub queue: QueueSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    /// Client heart-beat offered on CONNECT; 0 disables.
    pub heartbeat_ms: u64,
    pub cache_size: usize,
}

impl BrokerSettings {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.user.clone(), self.password.clone())
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            io_timeout: Duration::from_millis(self.io_timeout_ms),
            virtual_host: None,
            heartbeat: Duration::from_millis(self.heartbeat_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenerSettings {
    pub concurrency: Concurrency,
    pub receive_timeout_ms: u64,
    pub recovery_interval_ms: u64,
}

impl ListenerSettings {
    /// Container options with this listener's timings and `concurrency`.
    pub fn container_options(&self, concurrency: Concurrency) -> ContainerOptions {
        ContainerOptions {
            concurrency,
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
            recovery_interval: Duration::from_millis(self.recovery_interval_ms),
            ..ContainerOptions::default()
        }
    }
}

/// Queue names. Which ones a component uses depends on its role.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// The queue a terminal consumer listens on.
    pub name: String,
    pub input: String,
    pub output: String,
    pub component2: String,
    pub component4: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebLogicSettings {
    pub jms: WebLogicJmsSettings,
    pub queue: WebLogicQueueSettings,
    pub listener: WebLogicListenerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebLogicJmsSettings {
    /// Provider URL. The bridge is disabled while this is unset.
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub initial_context_factory: String,
    pub connection_factory: String,
}

impl WebLogicJmsSettings {
    /// The naming environment for the legacy broker, if one is configured.
    pub fn context_environment(&self) -> Option<ContextEnvironment> {
        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let mut env = ContextEnvironment::new(self.initial_context_factory.clone(), url);
        env.security_principal = self.username.clone();
        env.security_credentials = self.password.clone();
        Some(env)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebLogicQueueSettings {
    pub input: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebLogicListenerSettings {
    pub concurrency: Concurrency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}
