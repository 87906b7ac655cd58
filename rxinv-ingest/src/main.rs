//! rxinv-ingest - Pharmacy inventory ingestion service
//!
//! Runs the ingestion orchestrator once (`--once`) or on a fixed interval
//! until Ctrl+C / SIGTERM. Runs never overlap inside one process: the loop
//! awaits each run before sleeping. Overlap across processes is fenced by
//! the ledger's uniqueness constraint.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rxinv_ingest::config::{Args, IngestSettings};
use rxinv_ingest::db::{
    SqliteLedger, SqliteMedicationCatalog, SqliteStockSink, SqliteTenantRegistry,
};
use rxinv_ingest::services::{Collaborators, IngestionOrchestrator};
use rxinv_ingest::storage::{BlobInbox, LocalObjectStore};
use rxinv_ingest::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = IngestSettings::load(args).context("Failed to resolve configuration")?;

    // RUST_LOG wins; otherwise the configured level for our crates
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "rxinv_ingest={level},rxinv_common={level}",
                    level = settings.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting rxinv-ingest");
    settings.config_source.log();
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("RXINV_GIT_HASH"),
        env!("RXINV_BUILD_TIMESTAMP"),
        env!("RXINV_BUILD_PROFILE")
    );

    let pool = rxinv_common::db::init_database(&settings.database_url, settings.db_max_connections)
        .await
        .context("Failed to open database")?;
    info!(max_connections = settings.db_max_connections, "Database connection established");

    let store = LocalObjectStore::new(&settings.blob_root, &settings.blob_container);
    info!("Object store container: {}", store.container_dir().display());

    let orchestrator = Arc::new(IngestionOrchestrator::new(
        Collaborators {
            inbox: BlobInbox::new(
                Arc::new(store),
                &settings.inbox_prefix,
                &settings.processed_prefix,
                &settings.error_prefix,
            ),
            ledger: Arc::new(SqliteLedger::with_lock_wait(pool.clone(), settings.lock_wait_ms)),
            tenants: Arc::new(SqliteTenantRegistry::new(pool.clone())),
            catalog: Arc::new(SqliteMedicationCatalog::new(pool.clone())),
            sink: Arc::new(SqliteStockSink::new(pool.clone())),
        },
        settings.orchestrator_settings(),
    ));

    if settings.once {
        let summary = orchestrator.run().await;
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?
        );
        pool.close().await;
        return Ok(());
    }

    let state = AppState::new();

    if let Some(addr) = settings.bind {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("Listening on http://{}", addr);
        info!("Health check: http://{}/health", addr);

        let app = rxinv_ingest::build_router(state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    info!(interval_secs = settings.run_interval.as_secs(), "Scheduling ingestion runs");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(settings.run_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let summary = orchestrator.run().await;
                state.record_run(summary).await;
            }
        }
    }

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
