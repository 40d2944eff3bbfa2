//! Helper functions used while wiring the app in `main.rs`

use crate::{
    config::{AppConfig, DedupBackend},
    dedup::{ImplDedupStore, memory::MemoryDedupStore, sqlite::SqliteDedupStore},
};
use anyhow::Context;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use std::{str::FromStr, sync::Arc, time::Duration};

/// Pool for the shared dedup database. WAL lets several processes read while one writes.
pub async fn setup_sqlite_db_pool(db_url: &str) -> anyhow::Result<SqlitePool> {
    Ok(SqlitePool::connect_with(
        SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5)),
    )
    .await?)
}

pub async fn build_dedup_store(app_config: &AppConfig) -> anyhow::Result<ImplDedupStore> {
    match app_config.dedup_backend {
        DedupBackend::Memory => Ok(Arc::new(MemoryDedupStore::new(app_config.dedup_ttl())?)),
        DedupBackend::Sqlite => {
            let db_pool = setup_sqlite_db_pool(&app_config.dedup_db_url)
                .await
                .with_context(|| {
                    format!("failed to open dedup database {}", app_config.dedup_db_url)
                })?;

            Ok(Arc::new(
                SqliteDedupStore::new(db_pool, app_config.dedup_ttl()).await?,
            ))
        }
    }
}

/// Drops expired dedup keys forever, once per `interval`.
pub async fn sweep_expired_keys(dedup_store: ImplDedupStore, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match dedup_store.prune_expired().await {
            Ok(0) => {}
            Ok(pruned) => {
                tracing::info!("pruned {} expired dedup keys", pruned);
            }
            Err(err) => {
                logfire::error!(
                    "failed to prune dedup keys: {error}",
                    error = err.to_string()
                );
            }
        }
    }
}
