use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::cache::CarId;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// When set, every `/api/v1` request must carry it in `X-API-Key`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Browser origins allowed to call the API; `*` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Topic prefix in front of the car id, e.g. `teslamate/cars`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_car_ids")]
    pub car_ids: Vec<CarId>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_reconnect_min")]
    pub reconnect_min_ms: u64,
    #[serde(default = "default_max_reconnect_interval")]
    pub max_reconnect_interval_secs: u64,
    #[serde(default = "default_disconnect_grace")]
    pub disconnect_grace_ms: u64,
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "cyberui".to_string()
}
fn default_namespace() -> String {
    "teslamate/cars".to_string()
}
fn default_car_ids() -> Vec<CarId> {
    vec![1]
}
fn default_keep_alive() -> u64 {
    60
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_reconnect_min() -> u64 {
    500
}
fn default_max_reconnect_interval() -> u64 {
    10
}
fn default_disconnect_grace() -> u64 {
    250
}
fn default_request_capacity() -> usize {
    64
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            namespace: default_namespace(),
            car_ids: default_car_ids(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            reconnect_min_ms: default_reconnect_min(),
            max_reconnect_interval_secs: default_max_reconnect_interval(),
            disconnect_grace_ms: default_disconnect_grace(),
            request_capacity: default_request_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_min(&self) -> Duration {
        Duration::from_millis(self.reconnect_min_ms)
    }

    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_interval_secs)
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_ms)
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by variable name. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(host) = var("CYBERUI_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("CYBERUI_SERVER_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid CYBERUI_SERVER_PORT: {}", port))?;
        }
        if let Some(api_key) = var("CYBERUI_API_KEY") {
            self.server.api_key = Some(api_key);
        }
        if let Some(origins) = var("CYBERUI_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(host) = var("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = var("MQTT_PORT") {
            self.mqtt.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid MQTT_PORT: {}", port))?;
        }
        if let Some(client_id) = var("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(username) = var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(namespace) = var("MQTT_NAMESPACE") {
            self.mqtt.namespace = namespace;
        }
        if let Some(ids) = var("MQTT_CAR_IDS") {
            self.mqtt.car_ids = parse_car_ids(&ids)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let namespace = self.mqtt.namespace.trim_matches('/');
        if namespace.is_empty() {
            bail!("mqtt.namespace must not be empty");
        }
        if namespace.contains(['#', '+']) {
            bail!("mqtt.namespace must not contain wildcards: {}", namespace);
        }
        if self.mqtt.client_id.trim().is_empty() || self.mqtt.client_id.starts_with(' ') {
            bail!("mqtt.client_id must not be empty or start with a space");
        }
        if self.mqtt.connect_timeout_secs == 0 {
            bail!("mqtt.connect_timeout_secs must be greater than zero");
        }
        if self.mqtt.reconnect_min_ms == 0 {
            bail!("mqtt.reconnect_min_ms must be greater than zero");
        }
        if self.mqtt.max_reconnect_interval_secs == 0 {
            bail!("mqtt.max_reconnect_interval_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Parses a comma separated list of car ids, skipping blank entries.
pub fn parse_car_ids(value: &str) -> Result<Vec<CarId>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<CarId>()
                .with_context(|| format!("Invalid car id: {}", part))
        })
        .collect()
}
