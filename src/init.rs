//! Initialization helpers for the application startup.

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Keep rumqttc quiet unless explicitly enabled/overridden
        if !filter.contains("rumqttc") {
            filter.push_str(",rumqttc=warn");
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Loads the config file if it exists, then applies environment overrides.
///
/// Returns the config and whether the file was found.
pub async fn load_config(path: impl AsRef<Path>) -> Result<(Config, bool)> {
    let path = path.as_ref();
    let found = path.exists();
    let mut config = if found {
        Config::load(path).await?
    } else {
        Config::default()
    };
    config
        .apply_env()
        .context("Invalid environment override")?;
    config.validate()?;
    Ok((config, found))
}

/// Logs the effective settings without secrets.
pub fn log_config(config: &Config) {
    info!(
        "MQTT broker {}:{} as '{}', namespace '{}', cars {:?}",
        config.mqtt.host,
        config.mqtt.port,
        config.mqtt.client_id,
        config.mqtt.namespace,
        config.mqtt.car_ids
    );
    info!("CORS origins: {:?}", config.server.cors_origins);
    if config.server.api_key.is_some() {
        info!("API key authentication enabled");
    }
}
