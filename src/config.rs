use anyhow::Result;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

const CONFIG_FILE: &str = "order-lifecycle";

/// Runtime settings for the order lifecycle service.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub notifications: NotificationConfig,
    pub metrics: MetricsConfig,
    pub storage: StorageConfig,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Messages buffered per channel before a push counts as failed.
    pub channel_buffer: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { channel_buffer: 32 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Scylla,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub known_node: String,
    pub keyspace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            known_node: "127.0.0.1:9042".to_string(),
            keyspace: "orders_ks".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. order-lifecycle.toml, if present
    /// 3. Environment variables (ORDER_LIFECYCLE__STORAGE__BACKEND=scylla)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new(&format!("{}.toml", CONFIG_FILE)).exists() {
            builder = builder.add_source(File::with_name(CONFIG_FILE));
        }

        builder = builder.add_source(
            Environment::with_prefix("ORDER_LIFECYCLE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: ServiceConfig = builder.build()?.try_deserialize()?;
        anyhow::ensure!(
            config.notifications.channel_buffer > 0,
            "notifications.channel_buffer must be at least 1"
        );
        Ok(config)
    }
}
