//! Sensor Service (sensorsrv)
//!
//! Ingests city sensor readings, keeps a bounded history per sensor and
//! raises threshold alerts.

use anyhow::{Context, Result};
use common::logging::{self, LogConfig};
use common::{Parser, ServiceArgs};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use sensorsrv::api::create_router;
use sensorsrv::config::{SensorsrvConfig, DEFAULT_CONFIG_PATH};
use sensorsrv::{build_runtime, ServiceRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServiceArgs::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = SensorsrvConfig::load(Some(&config_path))
        .with_context(|| format!("loading {}", config_path.display()))?;

    if let Some((host, port)) = args.bind_override() {
        config.service.host = host;
        config.service.port = port;
    }

    config.validate().context("invalid configuration")?;

    if args.validate {
        println!("Configuration OK: {}", config_path.display());
        return Ok(());
    }

    logging::init_with_config(LogConfig {
        service_name: config.service.name.clone(),
        log_dir: config.logging.dir.clone(),
        console_level: args.parse_log_level(),
        filter: args.log_level.clone(),
        enable_file: config.logging.enable_file,
        enable_json: config.logging.enable_json,
    })?;

    info!("Starting Sensor Service...");

    let bind_address = config.bind_address();
    let drain_timeout = Duration::from_millis(config.dispatch.drain_timeout_ms);
    let ServiceRuntime { state, processor } = build_runtime(config).await?;

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;

    info!("Sensor Service started on {}", bind_address);
    info!("API endpoints:");
    info!("  GET  /sensors/data        - Simulate and ingest one batch");
    info!("  POST /api/readings        - Ingest readings");
    info!("  GET  /history/{{sensor_id}} - Sensor history");
    info!("  GET  /alerts              - Threshold table");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            common::shutdown::wait_for_shutdown().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Router and its dispatcher handles are gone; the queue closes and drains
    ServiceRuntime::drain(processor, drain_timeout).await;
    info!("Sensor Service stopped");
    Ok(())
}
