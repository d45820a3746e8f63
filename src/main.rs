// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use metric_dashboard::application::context::bootstrap;
use metric_dashboard::application::error_sink::TracingErrorSink;
use metric_dashboard::application::widget_board::WidgetBoard;
use metric_dashboard::infrastructure::config::load_dashboard_config;
use metric_dashboard::infrastructure::metric_store::StaticMetricSource;
use metric_dashboard::infrastructure::snapshot_store::FileSnapshotRepository;
use metric_dashboard::presentation::app_state::AppState;
use metric_dashboard::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_dashboard_config()?;
    let timings = config.timings();

    // Create adapters (infrastructure layer)
    let source = StaticMetricSource::from_file(&config.data.metrics_path)?;
    let snapshots = Arc::new(FileSnapshotRepository::new(&config.data.snapshot_path));

    let Some(default_day) = config.state.default_day.clone().or_else(|| source.last_day()) else {
        tracing::error!("No default day configured and {} holds no data", config.data.metrics_path);
        anyhow::bail!("Cannot choose a default day");
    };

    // Create the core (application layer)
    let mut dashboard = bootstrap(
        Arc::new(source),
        snapshots,
        Arc::new(TracingErrorSink),
        default_day,
        timings,
    )
    .await;
    let board = Arc::new(WidgetBoard::new(dashboard.context.clone()));
    dashboard.tasks.push(board.spawn_reconciler());

    // Create application state
    let state = AppState {
        context: dashboard.context.clone(),
        board,
    };

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind_addr))?;
    tracing::info!("Starting metric-dashboard service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, flushing dashboard state");
    dashboard.writer.flush().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
