//! Naviera HTTP server.

use naviera::{build_router, metrics, Config, Resources};
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "naviera=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Naviera");

    let config = Config::from_env()?;
    info!(
        storage = ?config.storage.backend,
        sessions = ?config.sessions.backend,
        address = %config.bind_address(),
        "Configuration loaded"
    );

    if let Some(port) = config.server.metrics_port {
        metrics::install_exporter(port)?;
        info!(port, "Prometheus exporter listening");
    }
    metrics::register_business_metrics();

    let resources = Resources::from_config(&config).await?;
    resources.prepare(&config).await?;
    let state = resources.into_state(&config);

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining in-flight commands");
    state
        .shutdown(Duration::from_secs(config.server.shutdown_timeout))
        .await;
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
