//! Configuration for hlofe-daemon

use hlofe_gateway::ClientSettings;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Entity store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Downstream notification configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Which entity store backs the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// NGSI-LD context broker over HTTP
    #[default]
    NgsiLd,
    /// Process-local store (for development/testing)
    Memory,
}

/// Entity store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Broker base URL
    #[serde(default = "default_store_url")]
    pub base_url: String,

    /// API root below the base URL
    #[serde(default = "default_api_path")]
    pub api_path: String,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Send the federation header with every request
    #[serde(default = "default_true")]
    pub federation: bool,

    /// Domain handler to use instead of asking the broker
    #[serde(default)]
    pub local_domain: Option<String>,

    #[serde(default)]
    pub token: TokenConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            base_url: default_store_url(),
            api_path: default_api_path(),
            query_timeout_secs: default_query_timeout(),
            write_timeout_secs: default_write_timeout(),
            federation: true,
            local_domain: None,
            token: TokenConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Settings for the HTTP gateway
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            api_path: self.api_path.clone(),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            federation: self.federation,
        }
    }
}

/// Where broker bearer tokens come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TokenConfig {
    /// Unauthenticated requests
    #[default]
    None,

    /// Fixed token
    Static { token: String },

    /// Token shim service
    Shim {
        url: String,

        #[serde(default = "default_shim_timeout")]
        timeout_secs: u64,
    },
}

/// Notification channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotifierConfig {
    /// Log only
    #[default]
    Disabled,

    /// In-process broadcast channel
    Broadcast {
        #[serde(default = "default_broadcast_capacity")]
        capacity: usize,
    },

    /// Kafka topic through the REST proxy
    Pandaproxy {
        url: String,

        #[serde(default = "default_topic")]
        topic: String,

        #[serde(default = "default_notify_timeout")]
        timeout_secs: u64,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8081))
}

fn default_store_url() -> String {
    "http://localhost:1026".to_string()
}

fn default_api_path() -> String {
    "ngsi-ld/v1/".to_string()
}

fn default_query_timeout() -> u64 {
    15
}

fn default_write_timeout() -> u64 {
    1
}

fn default_shim_timeout() -> u64 {
    5
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_topic() -> String {
    "hlo_fe".to_string()
}

fn default_notify_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then an optional file, then `HLOFE_*`
    /// environment variables (`HLOFE_STORE__BASE_URL=...`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("HLOFE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Configuration backed by the in-memory store
    pub fn development() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                ..Default::default()
            },
            notifier: NotifierConfig::Broadcast {
                capacity: default_broadcast_capacity(),
            },
            ..Default::default()
        }
    }
}
