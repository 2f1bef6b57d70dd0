//! User Service Library
//!
//! Credential persistence for the authentication service: stores a login and
//! an opaque password hash, assigns ids and looks users up by login. Engine
//! failures are translated into a small error taxonomy callers can branch on.

pub mod config;
pub mod context;
pub mod infra;
pub mod metrics;
pub mod repository;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::UserServiceConfig;
use crate::context::RequestContext;
use crate::infra::Database;
use crate::metrics::{InstrumentedRepository, MetricsServer, StoreMetrics};
use crate::repository::{StoreResult, UserRepository, UserStore};
use domain::User;

/// Connect the pool and build an instrumented store on top of it.
pub async fn build_store(
    config: &UserServiceConfig,
    metrics: Arc<StoreMetrics>,
) -> Result<Arc<dyn UserRepository>, Box<dyn std::error::Error>> {
    let db = Database::connect(&config.database).await?;
    db.ping().await?;
    if config.create_schema {
        db.create_schema().await?;
    }

    let store: Arc<dyn UserRepository> = Arc::new(UserStore::new(db.get_connection()));
    Ok(Arc::new(InstrumentedRepository::new(store, metrics)))
}

/// Run the service until Ctrl-C: open the store, export metrics, then shut
/// the exporter down and close the store.
pub async fn run(config: UserServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(StoreMetrics::new()?);
    let store = build_store(&config, metrics.clone()).await?;

    let shutdown = CancellationToken::new();
    let server = MetricsServer::new(config.metrics.clone(), metrics);
    let exporter = tokio::spawn(server.serve(shutdown.clone()));

    info!("User service ready");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    shutdown.cancel();
    exporter.await??;
    store.close().await?;

    Ok(())
}

/// Look a single user up (operator diagnostics).
pub async fn lookup(config: UserServiceConfig, login: &str) -> Result<User, Box<dyn std::error::Error>> {
    let db = Database::connect(&config.database).await?;
    db.ping().await?;
    let store = UserStore::new(db.get_connection());

    let ctx = RequestContext::with_timeout(config.request_timeout());
    let result: StoreResult<User> = store.find_by_login(&ctx, login).await;
    store.close().await?;

    Ok(result?)
}
