//! Server wiring.
//!
//! Provisions indexes, spawns the cache sweep and serves the router. The
//! projection side (BlockSession) is driven by the embedding node process,
//! not by this server.

use digest_engine::domains::DomainRegistry;
use digest_store::{DocumentStore, OpContext};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::ApiConfig;
use crate::handlers::AppState;
use crate::router::build_router;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("server bind error: {0}")]
    Bind(String),

    #[error("index provisioning failed: {0}")]
    Provision(#[from] digest_store::StoreError),
}

/// Initializes tracing from `RUST_LOG`; safe to call once at startup.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .try_init();
}

/// Applies the index registry; idempotent across restarts.
pub async fn provision_indexes(
    store: &dyn DocumentStore,
    registry: &DomainRegistry,
) -> Result<(), digest_store::StoreError> {
    let indexes = registry.index_registry();
    info!(indexes = indexes.len(), "provisioning secondary indexes");
    store.ensure_indexes(&OpContext::background(), &indexes).await
}

/// Runs the read API until the process exits.
pub async fn serve(
    config: ApiConfig,
    store: Arc<dyn DocumentStore>,
    registry: &DomainRegistry,
) -> Result<(), ServerError> {
    config.validate()?;
    provision_indexes(store.as_ref(), registry).await?;

    let state = AppState::new(store, config.clone());
    tokio::spawn(crate::cache::sweep_task(
        Arc::clone(&state.cache),
        Duration::from_secs(30),
    ));

    let addr = config.http_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(e.to_string()))?;
    info!(%addr, "read api listening");

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| ServerError::Bind(e.to_string()))
}
