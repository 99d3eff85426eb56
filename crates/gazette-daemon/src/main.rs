//! Greenhouse Gazette status daemon
//!
//! This binary coordinates:
//! - MQTT subscription to every greenhouse sensor topic
//! - Validation and 24h min/max aggregation
//! - status.json / stats_24h.json, the crash cache, and the monthly sensor log

mod scheduler;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};

use gazette_aggregator::SensorAggregator;
use gazette_config::AppConfig;
use gazette_ingest::{MqttFeed, ReconnectPolicy, SensorFeed};

use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    gazette_obs::init("gazetted");

    info!("Starting Greenhouse Gazette status daemon");

    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        status = %config.aggregator.status_path.display(),
        stats = %config.aggregator.stats_path.display(),
        cache = %config.aggregator.cache_path.display(),
        sensor_log = %config.aggregator.sensor_log_dir.display(),
        config_file = ?config.config_file,
        "Loaded configuration"
    );

    let mut aggregator = SensorAggregator::new(config.aggregator.clone());
    let restored = aggregator.restore(Utc::now());
    info!("Restored {} sensor keys from history cache", restored);

    let feed = Box::new(MqttFeed::new(config.mqtt.clone())) as Box<dyn SensorFeed>;
    let policy = ReconnectPolicy::fixed(std::time::Duration::from_secs(config.reconnect_delay));
    let mut scheduler = Scheduler::new(feed, aggregator, policy);

    info!("Daemon running - press Ctrl+C to stop");

    let outcome = tokio::select! {
        result = scheduler.run() => result,
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    scheduler.stop().await?;
    if let Err(e) = outcome {
        error!("Scheduler error: {}", e);
        return Err(e);
    }

    info!("Greenhouse Gazette daemon stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
