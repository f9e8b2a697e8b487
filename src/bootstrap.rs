//! Store construction from configuration.
//!
//! Picks the backend [`Config::storage_backend`] selects, connects it, runs
//! [`UrlStore::initialize`] and wraps everything in an [`AppState`].

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};
use crate::domain::repositories::{HealthCheck, UrlStore};
use crate::infrastructure::persistence::{FileUrlStore, PgUrlStore};
use crate::state::AppState;

/// Builds and initializes the configured store.
///
/// # Errors
///
/// Returns an error if:
/// - The database connection fails
/// - Migrations fail
/// - The journal file cannot be read, parsed, or opened for append
pub async fn build_state(config: &Config) -> Result<AppState> {
    let (store, health) = match config.storage_backend() {
        StorageBackend::Postgres(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
                .idle_timeout(Duration::from_secs(config.db_idle_timeout))
                .max_lifetime(Duration::from_secs(config.db_max_lifetime))
                .connect(&database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            let pg = Arc::new(PgUrlStore::new(Arc::new(pool), config.base_url.clone()));
            let store: Arc<dyn UrlStore> = pg.clone();
            let health: Arc<dyn HealthCheck> = pg;
            (store, Some(health))
        }
        StorageBackend::File(path) => {
            let store: Arc<dyn UrlStore> =
                Arc::new(FileUrlStore::new(config.base_url.clone(), Some(path)));
            (store, None)
        }
        StorageBackend::Memory => {
            let store: Arc<dyn UrlStore> =
                Arc::new(FileUrlStore::in_memory(config.base_url.clone()));
            (store, None)
        }
    };

    store
        .initialize()
        .await
        .context("Failed to initialize store")?;

    Ok(AppState::new(
        store,
        health,
        Duration::from_secs(config.batch_timeout_seconds),
    ))
}
