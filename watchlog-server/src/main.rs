//! watchlog-server - HTTP API for watch history statistics

use std::sync::Arc;

use anyhow::{Context, Result};
use watchlog_core::logging::{self, Output};
use watchlog_core::{Config, Database};
use watchlog_server::{build_router, cors_layer, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        logging::init(&config.logging, Output::FileAndStdout).context("failed to initialize logging")?;

    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let state = AppState::new(Arc::new(db), &config.stats).context("invalid stats configuration")?;
    let cors = cors_layer(&config.server.cors_origins).context("invalid CORS configuration")?;
    let app = build_router(state, cors);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %addr, cutoff = %config.stats.cutoff, "watchlog-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("watchlog-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
