use anyhow::Result;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cyberui::api::{start_api_server, ApiState};
use cyberui::cache::StatusCache;
use cyberui::ingress::TelemetryIngress;
use cyberui::init::{load_config, log_config, setup_logging};
use cyberui::stats::IngressStats;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let (config, found) = load_config(&config_path).await?;

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting cyberui...");
    if !found {
        info!("Config file not found, using defaults.");
    }
    log_config(&config);

    // 3. Shared state
    let cache = StatusCache::new();
    let stats = IngressStats::new();
    if config.stats.enable {
        stats.spawn_logger(Duration::from_secs(config.stats.log_interval_seconds.max(1)));
    }

    // 4. Connect MQTT ingress
    let ingress = match TelemetryIngress::connect(
        &config.mqtt,
        config.mqtt.car_ids.clone(),
        cache.clone(),
        stats.clone(),
    )
    .await
    {
        Ok(ingress) => ingress,
        Err(e) => {
            error!("Failed to connect to MQTT broker: {:#}", e);
            return Err(e);
        }
    };

    // 5. Start API Server
    let shutdown = CancellationToken::new();
    let api_state = ApiState::new(
        cache,
        stats,
        config.server.api_key.clone(),
        config.server.cors_origins.clone(),
    );
    let api_shutdown = shutdown.clone();
    let addr = (config.server.host.clone(), config.server.port);
    let mut server = tokio::spawn(async move {
        start_api_server(api_state, addr, async move { api_shutdown.cancelled().await }).await
    });

    // 6. Graceful Shutdown
    let result = tokio::select! {
        res = &mut server => res,
        res = signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            shutdown.cancel();
            server.await
        }
    };

    ingress.disconnect().await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!("API server error: {:#}", e);
            Err(e)
        }
        Err(e) => {
            error!("API server task failed: {}", e);
            Err(e.into())
        }
    }
}
