//! # Sync Queue Repository
//!
//! A durable mailbox of deferred transactions, drained by the server's queue
//! service.
//!
//! ## Entry States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   enqueue()                                                             │
//! │      │                                                                  │
//! │      ▼            claim()              mark_completed()                 │
//! │  ┌─────────┐  (conditional UPDATE)  ┌────────────┐      ┌───────────┐  │
//! │  │ pending │ ─────────────────────► │ processing │ ───► │ completed │  │
//! │  └─────────┘                        └─────┬──────┘      └───────────┘  │
//! │                                           │ mark_failed()               │
//! │                                           ▼                             │
//! │                                      ┌────────┐                         │
//! │                                      │ failed │  error_message kept     │
//! │                                      └────────┘                         │
//! │                                                                         │
//! │  Rows are never deleted. Order is (created_at, rowid).                  │
//! │  fail_processing() parks entries a crash left in processing.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use stockline_core::{QueueStatus, SyncQueueEntry};

use crate::error::{DbError, DbResult};

const ENTRY_COLUMNS: &str = r#"
    id, transaction_type, payload, status, created_at, processed_at, error_message
"#;

/// Repository for the server sync queue.
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

impl SyncQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncQueueRepository { pool }
    }

    /// Appends a pending entry.
    pub async fn enqueue(&self, transaction_type: &str, payload: &str) -> DbResult<SyncQueueEntry> {
        let entry = SyncQueueEntry {
            id: Uuid::new_v4().to_string(),
            transaction_type: transaction_type.trim().to_string(),
            payload: payload.to_string(),
            status: QueueStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            error_message: None,
        };

        debug!(
            id = %entry.id,
            transaction_type = %entry.transaction_type,
            "Queuing transaction"
        );

        sqlx::query(
            r#"
            INSERT INTO sync_queue (
                id, transaction_type, payload, status, created_at, processed_at, error_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.transaction_type)
        .bind(&entry.payload)
        .bind(entry.status)
        .bind(entry.created_at)
        .bind(entry.processed_at)
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Lists entries in creation order, optionally filtered by status.
    pub async fn list(&self, status: Option<QueueStatus>) -> DbResult<Vec<SyncQueueEntry>> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM sync_queue
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at ASC, rowid ASC
            "#
        );

        let entries = sqlx::query_as(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Pending entries, oldest first.
    pub async fn get_pending(&self) -> DbResult<Vec<SyncQueueEntry>> {
        self.list(Some(QueueStatus::Pending)).await
    }

    /// Gets an entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SyncQueueEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE id = ?1");

        let entry = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Moves an entry from `pending` to `processing`.
    ///
    /// Returns false if the entry is no longer pending, i.e. another drain
    /// got to it first.
    pub async fn claim(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET status = 'processing'
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Marks a claimed entry as completed.
    pub async fn mark_completed(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET
                status = 'completed',
                processed_at = ?2,
                error_message = NULL
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sync queue entry", id));
        }

        Ok(())
    }

    /// Marks a claimed entry as failed, keeping the error for inspection.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET
                status = 'failed',
                processed_at = ?2,
                error_message = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sync queue entry", id));
        }

        Ok(())
    }

    /// Moves every `processing` entry to `failed` with `error`.
    ///
    /// Only safe while no drain is running, i.e. at startup. Returns how many
    /// entries were parked.
    pub async fn fail_processing(&self, error: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sync_queue SET
                status = 'failed',
                processed_at = ?1,
                error_message = ?2
            WHERE status = 'processing'
            "#,
        )
        .bind(Utc::now())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Counts entries in a given status.
    pub async fn count_by_status(&self, status: QueueStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_entries_listed_in_creation_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.sync_queue();

        let a = queue.enqueue("sale", "{}").await.unwrap();
        let b = queue.enqueue("sale", "{}").await.unwrap();
        let c = queue.enqueue("inventory_adjustment", "{}").await.unwrap();

        let ids: Vec<String> = queue.list(None).await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.sync_queue();
        let entry = queue.enqueue("sale", "{}").await.unwrap();

        assert!(queue.claim(&entry.id).await.unwrap());
        assert!(!queue.claim(&entry.id).await.unwrap());
        assert!(queue.get_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_error_message() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.sync_queue();
        let ok = queue.enqueue("sale", "{}").await.unwrap();
        let bad = queue.enqueue("sale", "{}").await.unwrap();

        queue.claim(&ok.id).await.unwrap();
        queue.mark_completed(&ok.id).await.unwrap();
        queue.claim(&bad.id).await.unwrap();
        queue.mark_failed(&bad.id, "Product not found: x").await.unwrap();

        let failed = queue.list(Some(QueueStatus::Failed)).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_message.as_deref(), Some("Product not found: x"));
        assert!(failed[0].processed_at.is_some());

        let done = queue.get_by_id(&ok.id).await.unwrap().unwrap();
        assert_eq!(done.status, QueueStatus::Completed);
        assert_eq!(queue.count_by_status(QueueStatus::Completed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fail_processing_parks_claimed_entries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.sync_queue();
        let stuck = queue.enqueue("sale", "{}").await.unwrap();
        let waiting = queue.enqueue("sale", "{}").await.unwrap();
        queue.claim(&stuck.id).await.unwrap();

        assert_eq!(queue.fail_processing("interrupted").await.unwrap(), 1);

        let parked = queue.get_by_id(&stuck.id).await.unwrap().unwrap();
        assert_eq!(parked.status, QueueStatus::Failed);
        assert_eq!(parked.error_message.as_deref(), Some("interrupted"));

        let untouched = queue.get_by_id(&waiting.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, QueueStatus::Pending);
        assert_eq!(queue.fail_processing("interrupted").await.unwrap(), 0);
    }
}
