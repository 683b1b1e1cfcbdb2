use anyhow::{Context, Result};
use indicators::config::{load_config, IndicatorsConfig};
use indicators::http::build_client;
use indicators::process::{IndicatorRegistry, ProcessRunner};
use indicators::wps::{create_wps_router, WpsAppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indicators=info,crisma_indicators=info".into()),
        )
        .init();

    info!("CRISMA indicators starting...");

    // Configuration file is optional; environment overrides apply either way
    let config = match std::env::var("INDICATORS_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            load_config(&path)?
        }
        Err(_) => IndicatorsConfig::default(),
    }
    .apply_env();

    info!(
        bind = %config.server.bind,
        recalculate = config.server.recalculate,
        timeout_seconds = config.http.timeout_seconds,
        "Configuration loaded"
    );

    let http_client = build_client(&config.http)?;
    let registry = IndicatorRegistry::with_defaults();
    info!(processes = registry.len(), "Indicator registry initialized");

    let bind = config.server.bind.clone();
    let state = Arc::new(WpsAppState {
        registry,
        runner: ProcessRunner::new(http_client, config),
    });
    let router = create_wps_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(bind = %bind, "WPS API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "WPS API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("CRISMA indicators stopped");

    Ok(())
}
