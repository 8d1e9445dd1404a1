// src/main.rs
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use gateway_health::{
    config,
    health::{CompositeHealthIndicator, HealthMonitor, HealthProvider, Target},
    metrics::MetricsRegistry,
    server::{MetricsHandler, RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gateway_health=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    match &config_path {
        Some(path) => info!("Loading configuration from: {}", path.display()),
        None => info!("No config file given, using defaults and environment"),
    }
    let config = config::load_config(config_path.as_deref())?;

    for target in &config.targets {
        info!("Registered health target {} at {}", target.name, target.url);
    }

    // Initialize metrics
    let metrics_registry = Arc::new(MetricsRegistry::new()?);

    // Build the composite indicator
    let targets = config.targets.iter().map(Target::from).collect();
    let indicator = Arc::new(
        CompositeHealthIndicator::new(targets, config.health.clone())
            .context("Invalid health target list")?
            .with_metrics(metrics_registry.collector()),
    );

    // Start background monitor if configured
    let monitor = config.health.monitor_interval().map(|period| {
        let monitor = Arc::new(HealthMonitor::new(indicator.clone(), period));
        tokio::spawn(monitor.clone().start());
        monitor
    });

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        let handler = MetricsHandler::new(metrics_registry.clone(), config.metrics.path.clone());
        info!(
            "Metrics server listening on http://{}{}",
            metrics_addr, config.metrics.path
        );

        tokio::spawn(async move {
            if let Err(e) = ServerBuilder::new(metrics_addr)
                .with_handler(handler)
                .serve()
                .await
            {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Start health server
    let provider: Arc<dyn HealthProvider> = indicator;
    let handler = RequestHandler::new(provider, config.server.health_path.clone());
    info!(
        "Serving aggregated health on http://{}{}",
        config.server.listen_addr, config.server.health_path
    );

    ServerBuilder::new(config.server.listen_addr)
        .with_handler(handler)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    if let Some(monitor) = monitor {
        monitor.shutdown();
    }

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
