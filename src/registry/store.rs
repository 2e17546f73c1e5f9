use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tokio::time::sleep;

use crate::registry::types::WorkerDefinition;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_millis(2000);

/// Persistent store of worker definitions; the registry's tier-3 fallback.
#[async_trait]
pub trait WorkerStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<WorkerDefinition>>;
    async fn get_by_cid(&self, cid: &str) -> Result<Option<WorkerDefinition>>;
    async fn list_active(&self) -> Result<Vec<WorkerDefinition>>;
}

/// Retries a store read with exponential backoff (100 → 200 → 400 ms,
/// capped at 2 s).
pub async fn with_retry<T, F, Fut>(op: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = INITIAL_BACKOFF;
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    "worker store {} failed (attempt {}/{}): {}",
                    op,
                    attempt,
                    MAX_ATTEMPTS,
                    err
                );
                sleep(delay.min(BACKOFF_CAP)).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Sqlite-backed implementation. The table is created at connect time; no
/// migration step is required.
pub struct SqliteWorkerStore {
    pool: SqlitePool,
}

impl SqliteWorkerStore {
    pub async fn connect(url: &str) -> Result<Self> {
        // A single connection keeps `sqlite::memory:` databases coherent.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workers (
                id TEXT PRIMARY KEY,
                code_cid TEXT NOT NULL,
                name TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT 'null',
                active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub async fn upsert(&self, def: &WorkerDefinition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workers (id, code_cid, name, metadata, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT(id) DO UPDATE SET
                code_cid = excluded.code_cid,
                name = excluded.name,
                metadata = excluded.metadata,
                active = excluded.active
            "#,
        )
        .bind(&def.id)
        .bind(&def.code_cid)
        .bind(&def.name)
        .bind(serde_json::to_string(&def.metadata)?)
        .bind(i64::from(def.active))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_definition(row: &sqlx::sqlite::SqliteRow) -> Result<WorkerDefinition> {
        let metadata_raw: String = row.get("metadata");
        Ok(WorkerDefinition {
            id: row.get("id"),
            code_cid: row.get("code_cid"),
            name: row.get("name"),
            metadata: serde_json::from_str(&metadata_raw)?,
            active: row.get::<i64, _>("active") != 0,
        })
    }
}

#[async_trait]
impl WorkerStore for SqliteWorkerStore {
    async fn get(&self, id: &str) -> Result<Option<WorkerDefinition>> {
        let row = sqlx::query("SELECT * FROM workers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_definition).transpose()
    }

    async fn get_by_cid(&self, cid: &str) -> Result<Option<WorkerDefinition>> {
        let row = sqlx::query("SELECT * FROM workers WHERE code_cid = $1")
            .bind(cid)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_definition).transpose()
    }

    async fn list_active(&self) -> Result<Vec<WorkerDefinition>> {
        let rows = sqlx::query("SELECT * FROM workers WHERE active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_definition).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str, active: bool) -> WorkerDefinition {
        WorkerDefinition {
            id: id.to_string(),
            code_cid: format!("bafy-{id}"),
            name: format!("worker {id}"),
            metadata: serde_json::json!({"memory": 128}),
            active,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = SqliteWorkerStore::connect("sqlite::memory:").await.unwrap();
        store.upsert(&definition("w1", true)).await.unwrap();

        let found = store.get("w1").await.unwrap().unwrap();
        assert_eq!(found, definition("w1", true));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_by_cid() {
        let store = SqliteWorkerStore::connect("sqlite::memory:").await.unwrap();
        store.upsert(&definition("w1", true)).await.unwrap();

        let found = store.get_by_cid("bafy-w1").await.unwrap().unwrap();
        assert_eq!(found.id, "w1");
    }

    #[tokio::test]
    async fn test_list_active_filters_inactive() {
        let store = SqliteWorkerStore::connect("sqlite::memory:").await.unwrap();
        store.upsert(&definition("w1", true)).await.unwrap();
        store.upsert(&definition("w2", false)).await.unwrap();
        store.upsert(&definition("w3", true)).await.unwrap();

        let active = store.list_active().await.unwrap();
        let ids: Vec<&str> = active.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w3"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let store = SqliteWorkerStore::connect("sqlite::memory:").await.unwrap();
        store.upsert(&definition("w1", true)).await.unwrap();

        let mut updated = definition("w1", true);
        updated.name = "renamed".into();
        store.upsert(&updated).await.unwrap();

        assert_eq!(store.get("w1").await.unwrap().unwrap().name, "renamed");
        assert_eq!(store.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_after_failures() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let attempts = AtomicU32::new(0);

        let result = with_retry("get", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    anyhow::bail!("transient");
                }
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_three() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let attempts = AtomicU32::new(0);

        let result: Result<u32> = with_retry("get", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { anyhow::bail!("down") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
