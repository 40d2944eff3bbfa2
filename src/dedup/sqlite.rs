//! Dedup store shared by every process on a host through one SQLite file.
//!
//! Atomicity comes from SQLite itself: the check and the mark are a single
//! conditional upsert, so two processes racing on the same key cannot both
//! change the row.

use super::{DedupKey, DedupStore, MarkOutcome, sqlite_queries};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::SqlitePool;
use std::time::Duration;

#[derive(Clone)]
pub struct SqliteDedupStore {
    db_pool: SqlitePool,
    ttl: TimeDelta,
}

impl SqliteDedupStore {
    /// Wraps `db_pool` and creates the keys table when missing.
    pub async fn new(db_pool: SqlitePool, ttl: Duration) -> anyhow::Result<Self> {
        sqlx::query(sqlite_queries::QUERY_CREATE_DEDUP_KEYS)
            .execute(&db_pool)
            .await
            .context("failed to create dedup_keys table")?;

        Ok(Self {
            db_pool,
            ttl: TimeDelta::from_std(ttl).context("dedup ttl is out of range")?,
        })
    }

    pub async fn mark_at(&self, key: &DedupKey, now: DateTime<Utc>) -> anyhow::Result<MarkOutcome> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let result = sqlx::query(sqlite_queries::QUERY_CHECK_AND_MARK)
            .bind(key.as_str())
            .bind(expires_at.timestamp_millis())
            .bind(now.timestamp_millis())
            .execute(&self.db_pool)
            .await?;

        Ok(MarkOutcome {
            is_new: result.rows_affected() == 1,
        })
    }

    pub async fn prune_at(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let result = sqlx::query(sqlite_queries::QUERY_DELETE_EXPIRED)
            .bind(now.timestamp_millis())
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl DedupStore for SqliteDedupStore {
    async fn check_and_mark(&self, key: &DedupKey) -> anyhow::Result<MarkOutcome> {
        self.mark_at(key, Utc::now()).await
    }

    async fn prune_expired(&self) -> anyhow::Result<usize> {
        self.prune_at(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteDedupStore {
        // a single connection, every new in-memory connection is a new database
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        SqliteDedupStore::new(db_pool, Duration::from_secs(60))
            .await
            .unwrap()
    }

    fn key(value: &str) -> DedupKey {
        DedupKey::from(value.to_string())
    }

    #[ntex::test]
    async fn test_mark_then_seen() {
        let store = memory_store().await;
        let now = Utc::now();

        assert!(store.mark_at(&key("a"), now).await.unwrap().is_new);
        assert!(
            !store
                .mark_at(&key("a"), now + TimeDelta::seconds(10))
                .await
                .unwrap()
                .is_new
        );
        assert!(store.mark_at(&key("b"), now).await.unwrap().is_new);
    }

    #[ntex::test]
    async fn test_expired_key_is_revived() {
        let store = memory_store().await;
        let now = Utc::now();

        store.mark_at(&key("a"), now).await.unwrap();
        let later = now + TimeDelta::seconds(61);

        assert!(store.mark_at(&key("a"), later).await.unwrap().is_new);
        assert!(!store.mark_at(&key("a"), later).await.unwrap().is_new);
    }

    #[ntex::test]
    async fn test_prune_expired_rows() {
        let store = memory_store().await;
        let now = Utc::now();

        store.mark_at(&key("old"), now).await.unwrap();
        store
            .mark_at(&key("fresh"), now + TimeDelta::seconds(30))
            .await
            .unwrap();

        assert_eq!(store.prune_at(now + TimeDelta::seconds(61)).await.unwrap(), 1);
        assert_eq!(store.prune_at(now + TimeDelta::seconds(61)).await.unwrap(), 0);
    }

    #[ntex::test]
    async fn test_store_can_be_reopened_on_same_pool() {
        let store = memory_store().await;
        store.mark_at(&key("a"), Utc::now()).await.unwrap();

        let reopened = SqliteDedupStore::new(store.db_pool.clone(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(!reopened.check_and_mark(&key("a")).await.unwrap().is_new);
    }

    #[ntex::test]
    async fn test_concurrent_marks_on_shared_file_have_single_winner() {
        let db_path = std::env::temp_dir().join(format!(
            "call-relay-dedup-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let db_url = format!("sqlite:{}", db_path.display());

        let db_pool = crate::utils::setup_sqlite_db_pool(&db_url).await.unwrap();
        let store = SqliteDedupStore::new(db_pool, Duration::from_secs(60))
            .await
            .unwrap();
        let now = Utc::now();
        let same = key("call-ended:X:note");

        let outcomes =
            futures::future::join_all((0..32).map(|_| store.mark_at(&same, now))).await;

        let winners = outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap())
            .filter(|outcome| outcome.is_new)
            .count();
        assert_eq!(winners, 1);

        store.db_pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", db_path.display()));
        }
    }
}
