//! Herd prediction server
//!
//! Loads the persisted yield and disease bundles once at start-up and serves
//! predictions and record lookups over HTTP.

use anyhow::Result;
use herd_lib::{
    health::{components, HealthRegistry},
    BundleStore, CsvRecordStore, PredictionService, ServiceMetrics, StructuredLogger,
};
use herd_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting herd-server");

    let config = ServerConfig::load()?;
    info!(
        data_path = %config.data_path.display(),
        model_dir = %config.model_dir.display(),
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::RECORD_STORE).await;

    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(&config.service_name);

    // Bundle decoding is CPU and disk bound
    let bundle_store = BundleStore::new(&config.model_dir);
    let service_logger = logger.clone();
    let predictions =
        tokio::task::spawn_blocking(move || PredictionService::load(&bundle_store, service_logger))
            .await?;
    api::report_model_health(&health_registry, &predictions).await;

    let records = Arc::new(CsvRecordStore::new(&config.data_path));
    if records.exists() {
        let store = Arc::clone(&records);
        match tokio::task::spawn_blocking(move || store.read_all()).await? {
            Ok(rows) => {
                metrics.set_records_stored(rows.len());
                health_registry
                    .set_healthy(components::RECORD_STORE)
                    .await;
            }
            Err(e) => {
                error!(error = %e, "Record table is unreadable");
                health_registry
                    .set_unhealthy(components::RECORD_STORE, e.to_string())
                    .await;
            }
        }
    } else {
        health_registry
            .set_degraded(
                components::RECORD_STORE,
                "record table not found, it is created on first append",
            )
            .await;
    }

    logger.log_startup(SERVER_VERSION, predictions.loaded_count());

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        predictions,
        records,
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    tokio::select! {
        result = api::serve(config.listen_addr(), app_state) => {
            if let Err(e) = &result {
                logger.log_shutdown(&format!("API server stopped: {}", e));
            }
            result?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            info!("Shutting down");
        }
    }

    Ok(())
}
