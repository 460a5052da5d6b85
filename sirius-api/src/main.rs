//! Sirius API Server Entry Point
//!
//! Bootstraps configuration, opens the record store and the cache, and
//! starts the Axum HTTP server.

use std::sync::Arc;

use axum::Router;
use sirius_api::telemetry::{init_tracer, TelemetryConfig};
use sirius_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AuthConfig, CachedCatalog, DbConfig,
    PgRecordStore, StoreKind,
};
use sirius_storage::{build_cache, CacheSettings, InMemoryRecordStore, RecordStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env()?;
    init_tracer(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let auth_config = AuthConfig::from_env();

    let store = open_store(api_config.store).await?;

    let cache_settings = CacheSettings::from_env();
    let cache = build_cache(&cache_settings).await;
    tracing::info!(
        backend = cache.backend_name(),
        prefix = %cache_settings.prefix,
        ttl_secs = cache_settings.ttl.as_secs(),
        "Cache ready"
    );

    let catalog = CachedCatalog::new(store, cache);
    let app: Router = create_api_router(catalog, &api_config, auth_config)?;

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, store = api_config.store.as_str(), "Starting Sirius API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn open_store(kind: StoreKind) -> ApiResult<Arc<dyn RecordStore>> {
    match kind {
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory record store; data is lost on restart");
            Ok(Arc::new(InMemoryRecordStore::new()))
        }
        StoreKind::Postgres => {
            let db_config = DbConfig::from_env();
            let store = PgRecordStore::from_config(&db_config)?;
            store.migrate().await?;
            tracing::info!(
                host = %db_config.host,
                dbname = %db_config.dbname,
                pool_size = store.pool_size(),
                "Postgres record store ready"
            );
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolve once `signal` fires. A signal that cannot be installed never
/// resolves, so the server keeps running.
async fn wait_for_shutdown<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_failed_signal_keeps_server_running() {
        let failed = async { Err(std::io::Error::other("no signal handler")) };
        let waited =
            tokio::time::timeout(Duration::from_secs(3600), wait_for_shutdown(failed)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_signal_triggers_shutdown() {
        wait_for_shutdown(async { Ok(()) }).await;
    }
}
