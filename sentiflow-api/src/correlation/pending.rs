//! Pending table: correlation id → original input text
//!
//! Backed by SQLite so in-flight correlations survive an API restart. Every
//! operation is a single statement, which makes `insert` and `take` atomic
//! with respect to each other: a text is handed out at most once.

use sentiflow_common::{CorrelationId, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Durable side table of texts awaiting a worker result
#[derive(Clone)]
pub struct PendingTable {
    pool: SqlitePool,
    ttl: Duration,
    capacity: usize,
}

impl PendingTable {
    /// Open (creating if needed) the SQLite file at `db_path`
    pub async fn open(db_path: &Path, ttl: Duration, capacity: usize) -> Result<Self> {
        let newly_created = !db_path.exists();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        if newly_created {
            info!("Initialized new pending database: {}", db_path.display());
        } else {
            info!("Opened existing pending database: {}", db_path.display());
        }

        Self::with_pool(pool, ttl, capacity).await
    }

    /// Non-persistent table for tests and in-process runs
    ///
    /// A single connection that never expires, since each SQLite memory
    /// connection is its own database.
    pub async fn in_memory(ttl: Duration, capacity: usize) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool, ttl, capacity).await
    }

    async fn with_pool(pool: SqlitePool, ttl: Duration, capacity: usize) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_text (
                correlation_id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pending_created ON pending_text(created_at)")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            ttl,
            capacity: capacity.max(1),
        })
    }

    /// Record the text for `correlation_id`, then trim to capacity
    pub async fn insert(&self, correlation_id: &CorrelationId, text: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO pending_text (correlation_id, text, created_at) VALUES (?, ?, ?)",
        )
        .bind(correlation_id.as_str())
        .bind(text)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        self.enforce_capacity().await?;
        Ok(())
    }

    /// Remove and return the text for `correlation_id`, if still pending
    pub async fn take(&self, correlation_id: &CorrelationId) -> Result<Option<String>> {
        let text: Option<String> =
            sqlx::query_scalar("DELETE FROM pending_text WHERE correlation_id = ? RETURNING text")
                .bind(correlation_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(text)
    }

    pub async fn contains(&self, correlation_id: &CorrelationId) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM pending_text WHERE correlation_id = ?")
                .bind(correlation_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_text")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drop entries older than the TTL; returns how many were removed
    pub async fn evict_expired(&self) -> Result<u64> {
        let cutoff = now_millis() - self.ttl.as_millis().min(i64::MAX as u128) as i64;
        let removed = sqlx::query("DELETE FROM pending_text WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if removed > 0 {
            debug!(removed, "evicted expired pending texts");
        }
        Ok(removed)
    }

    async fn enforce_capacity(&self) -> Result<()> {
        let len = self.len().await?;
        let capacity = self.capacity as u64;
        if len <= capacity {
            return Ok(());
        }
        let excess = (len - capacity) as i64;
        sqlx::query(
            r#"
            DELETE FROM pending_text WHERE correlation_id IN (
                SELECT correlation_id FROM pending_text
                ORDER BY created_at ASC, rowid ASC
                LIMIT ?
            )
            "#,
        )
        .bind(excess)
        .execute(&self.pool)
        .await?;
        debug!(excess, "pending table over capacity, evicted oldest");
        Ok(())
    }
}

fn now_millis() -> i64 {
    sentiflow_common::time::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table(capacity: usize) -> PendingTable {
        PendingTable::in_memory(Duration::from_secs(3600), capacity)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_take_consumes_exactly_once() {
        let pending = table(10).await;
        let cid = CorrelationId::from("x");
        pending.insert(&cid, "hello").await.unwrap();

        assert_eq!(pending.take(&cid).await.unwrap().as_deref(), Some("hello"));
        assert_eq!(pending.take(&cid).await.unwrap(), None);
        assert!(!pending.contains(&cid).await.unwrap());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let pending = table(2).await;
        for id in ["a", "b", "c"] {
            pending.insert(&CorrelationId::from(id), id).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(pending.len().await.unwrap(), 2);
        assert!(!pending.contains(&CorrelationId::from("a")).await.unwrap());
        assert!(pending.contains(&CorrelationId::from("c")).await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_eviction() {
        let pending = PendingTable::in_memory(Duration::from_millis(10), 100)
            .await
            .unwrap();
        pending.insert(&CorrelationId::from("old"), "t").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(pending.evict_expired().await.unwrap(), 1);
        assert!(pending.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.db");
        let cid = CorrelationId::from("persisted");

        let first = PendingTable::open(&path, Duration::from_secs(60), 10).await.unwrap();
        first.insert(&cid, "keep me").await.unwrap();
        drop(first);

        let second = PendingTable::open(&path, Duration::from_secs(60), 10).await.unwrap();
        assert_eq!(second.take(&cid).await.unwrap().as_deref(), Some("keep me"));
    }
}
