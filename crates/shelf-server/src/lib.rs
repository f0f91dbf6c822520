//! shelf-server: HTTP API and catalog coordination for photoshelf.
//!
//! This crate ties the metadata store and the blob store together into a
//! running server. It provides:
//!
//! - Upload, delete and reconciliation services that keep rows and blobs
//!   consistent ([`catalog`])
//! - Axum-based HTTP API with request IDs, CORS and tracing
//! - Startup with bounded database retry and graceful shutdown

pub mod catalog;
pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shelf_core::config::{Config, DatabaseConfig};
use shelf_core::{Error, Result};
use shelf_db::DbHandle;
use shelf_storage::FilesystemBlobStore;
use tokio_util::sync::CancellationToken;

use crate::catalog::SqlitePhotoRepository;
use crate::context::AppContext;

/// Connect to the metadata store, retrying as configured, and bring the
/// schema up to date. Fails with [`Error::Connection`] once the retry budget
/// is spent.
pub async fn connect_database(config: &DatabaseConfig) -> Result<DbHandle> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created database directory {}", parent.display());
        }
    }

    let handle = DbHandle::new();
    let init_handle = handle.clone();
    let init_config = config.clone();
    tokio::task::spawn_blocking(move || init_handle.initialize(&init_config))
        .await
        .map_err(|e| Error::Internal(format!("database startup task failed: {e}")))??;

    tracing::info!("Database ready at {}", config.path.display());
    Ok(handle)
}

/// Build the [`AppContext`] for a configuration: database, blob store and
/// the services on top of them.
///
/// Fails with `Validation` when the public blob prefix overlaps an API path,
/// since the router could not mount both.
pub async fn build_context(config: Config) -> Result<AppContext> {
    if let Some(path) = config.storage.prefix_conflict() {
        return Err(Error::Validation(format!(
            "storage.public_prefix {:?} overlaps the API path {path}",
            config.storage.public_prefix
        )));
    }

    let db = connect_database(&config.database).await?;
    let blobs = FilesystemBlobStore::from_config(&config.storage).await?;
    tracing::info!("Storing uploads in {}", blobs.root().display());

    Ok(AppContext::new(
        config,
        Arc::new(SqlitePhotoRepository::new(db)),
        Arc::new(blobs),
    ))
}

/// Start the photoshelf server.
///
/// Initializes the stores, spawns the periodic blob sweeper when configured,
/// and serves HTTP until a shutdown signal arrives.
pub async fn start(config: Config) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = build_context(config).await?;
    let cancel = CancellationToken::new();

    let sweeper_handle = ctx
        .config
        .storage
        .sweep_interval_secs
        .filter(|secs| *secs > 0)
        .map(|secs| {
            let sweeper = ctx.sweeper();
            let cancel = cancel.clone();
            tokio::spawn(sweeper.run_periodic(Duration::from_secs(secs), cancel))
        });

    let app = router::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C, SIGTERM, or cancellation of `cancel`.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
