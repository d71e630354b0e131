//! # Offline Store
//!
//! The terminal's own SQLite file. It survives restarts and never touches the
//! network.
//!
//! ## Collections
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  pending_sales     sales recorded while the server was unreachable      │
//! │  ───────────────                                                        │
//! │   add_pending_sale()                                                    │
//! │      │                                                                  │
//! │      ▼          mark syncing          accepted                          │
//! │  ┌─────────┐ ─────────────► ┌─────────┐ ──────► (row deleted)           │
//! │  │ pending │                │ syncing │                                 │
//! │  └─────────┘ ◄───────┐      └────┬────┘                                 │
//! │                      │           │ rejected / unreachable               │
//! │        reset_failed()│           ▼                                      │
//! │                      │      ┌────────┐                                  │
//! │                      └───── │ failed │  error kept                      │
//! │                             └────────┘                                  │
//! │                                                                         │
//! │  cached_products   snapshot of GET /api/inventory, replaced wholesale   │
//! │  settings          small key/value pairs (last_sync_at, ...)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stockline_core::validation::validate_sale_lines;
use stockline_core::{PendingSale, PendingSaleStatus, ProductWithInventory, SaleLineRequest};

use crate::error::{SyncError, SyncResult};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/client");

/// Error recorded on entries found mid-replay when the store is opened.
const INTERRUPTED_ERROR: &str = "Interrupted during sync; retry once the server state is checked";

const PENDING_COLUMNS: &str = "id, items, created_at, status, error";

const PRODUCT_COLUMNS: &str = r#"
    id, name, description, category, price_cents, barcode,
    quantity, min_stock_level, last_updated
"#;

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PendingSaleRow {
    id: String,
    items: String,
    created_at: DateTime<Utc>,
    status: PendingSaleStatus,
    error: Option<String>,
}

impl TryFrom<PendingSaleRow> for PendingSale {
    type Error = SyncError;

    fn try_from(row: PendingSaleRow) -> SyncResult<Self> {
        Ok(PendingSale {
            items: serde_json::from_str(&row.items)?,
            id: row.id,
            created_at: row.created_at,
            status: row.status,
            error: row.error,
        })
    }
}

/// Partial update of a pending sale.
///
/// `error: Some(None)` clears a stored error, `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingSaleUpdate {
    pub status: Option<PendingSaleStatus>,
    pub error: Option<Option<String>>,
}

impl PendingSaleUpdate {
    /// Entry is being submitted.
    pub fn syncing() -> Self {
        PendingSaleUpdate {
            status: Some(PendingSaleStatus::Syncing),
            error: Some(None),
        }
    }

    /// Entry failed with the given detail.
    pub fn failed(error: impl Into<String>) -> Self {
        PendingSaleUpdate {
            status: Some(PendingSaleStatus::Failed),
            error: Some(Some(error.into())),
        }
    }

    /// Entry goes back to the replay queue.
    pub fn reset() -> Self {
        PendingSaleUpdate {
            status: Some(PendingSaleStatus::Pending),
            error: Some(None),
        }
    }
}

/// Pending sale counts per status, for the sync indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub syncing: i64,
    pub failed: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.syncing + self.failed
    }
}

// =============================================================================
// Offline Store
// =============================================================================

/// Durable local storage for a terminal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    pool: SqlitePool,
}

impl OfflineStore {
    /// Opens (creating if needed) the store at `path` and applies migrations.
    pub async fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening offline store");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Store(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    /// Opens a throwaway store (for testing).
    pub async fn in_memory() -> SyncResult<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);

        // One connection; a second would see a different database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> SyncResult<Self> {
        MIGRATOR.run(&pool).await?;
        let store = OfflineStore { pool };
        store.fail_interrupted().await?;
        Ok(store)
    }

    /// Entries left in `syncing` by a crash may or may not have reached the
    /// server, so they are parked as failed instead of replayed blindly.
    async fn fail_interrupted(&self) -> SyncResult<()> {
        let result = sqlx::query(
            "UPDATE pending_sales SET status = 'failed', error = ?1 WHERE status = 'syncing'",
        )
        .bind(INTERRUPTED_ERROR)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            warn!(
                count = result.rows_affected(),
                "Found sales interrupted mid-sync, marked as failed"
            );
        }

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Pending Sales
    // =========================================================================

    /// Records a sale for later replay.
    pub async fn add_pending_sale(&self, items: Vec<SaleLineRequest>) -> SyncResult<PendingSale> {
        validate_sale_lines(&items)?;

        let sale = PendingSale {
            id: Uuid::new_v4().to_string(),
            items,
            created_at: Utc::now(),
            status: PendingSaleStatus::Pending,
            error: None,
        };

        sqlx::query(
            r#"
            INSERT INTO pending_sales (id, items, created_at, status, error)
            VALUES (?1, ?2, ?3, ?4, NULL)
            "#,
        )
        .bind(&sale.id)
        .bind(serde_json::to_string(&sale.items)?)
        .bind(sale.created_at)
        .bind(sale.status)
        .execute(&self.pool)
        .await?;

        info!(id = %sale.id, lines = sale.items.len(), "Sale stored offline");
        Ok(sale)
    }

    /// Pending sales in recording order, optionally filtered by status.
    pub async fn get_pending_sales(
        &self,
        status: Option<PendingSaleStatus>,
    ) -> SyncResult<Vec<PendingSale>> {
        let sql = format!(
            r#"
            SELECT {PENDING_COLUMNS}
            FROM pending_sales
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at ASC, rowid ASC
            "#
        );

        let rows: Vec<PendingSaleRow> = sqlx::query_as(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PendingSale::try_from).collect()
    }

    pub async fn get_pending_sale(&self, id: &str) -> SyncResult<Option<PendingSale>> {
        let sql = format!("SELECT {PENDING_COLUMNS} FROM pending_sales WHERE id = ?1");

        let row: Option<PendingSaleRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(PendingSale::try_from).transpose()
    }

    /// Applies a partial update. Fails with `NotFound` for an unknown id.
    pub async fn update_pending_sale(&self, id: &str, update: PendingSaleUpdate) -> SyncResult<()> {
        let (set_error, error) = match update.error {
            Some(error) => (true, error),
            None => (false, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE pending_sales SET
                status = COALESCE(?2, status),
                error = CASE WHEN ?3 THEN ?4 ELSE error END
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(set_error)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound {
                entity: "Pending sale",
                id: id.to_string(),
            });
        }

        debug!(id = %id, status = ?update.status, "Pending sale updated");
        Ok(())
    }

    /// Removes a pending sale. Returns false if it was already gone.
    pub async fn delete_pending_sale(&self, id: &str) -> SyncResult<bool> {
        let result = sqlx::query("DELETE FROM pending_sales WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Moves every failed entry back to pending. Returns how many moved.
    pub async fn reset_failed(&self) -> SyncResult<u64> {
        let result = sqlx::query(
            "UPDATE pending_sales SET status = 'pending', error = NULL WHERE status = 'failed'",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Number of entries waiting for replay.
    pub async fn count_pending(&self) -> SyncResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_sales WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    pub async fn count_by_status(&self) -> SyncResult<StatusCounts> {
        let rows: Vec<(PendingSaleStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM pending_sales GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            match status {
                PendingSaleStatus::Pending => counts.pending = count,
                PendingSaleStatus::Syncing => counts.syncing = count,
                PendingSaleStatus::Failed => counts.failed = count,
            }
        }

        Ok(counts)
    }

    // =========================================================================
    // Product Cache
    // =========================================================================

    /// Replaces the whole cache in one transaction. Returns the row count.
    pub async fn replace_product_cache(&self, products: &[ProductWithInventory]) -> SyncResult<usize> {
        let cached_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cached_products")
            .execute(&mut *tx)
            .await?;

        for product in products {
            sqlx::query(
                r#"
                INSERT INTO cached_products (
                    id, name, description, category, price_cents, barcode,
                    quantity, min_stock_level, last_updated, cached_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&product.id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.category)
            .bind(product.price_cents)
            .bind(&product.barcode)
            .bind(product.quantity)
            .bind(product.min_stock_level)
            .bind(product.last_updated)
            .bind(cached_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(count = products.len(), "Product cache replaced");
        Ok(products.len())
    }

    /// Cached products ordered by name.
    pub async fn cached_products(&self) -> SyncResult<Vec<ProductWithInventory>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM cached_products ORDER BY name ASC");

        let products = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(products)
    }

    pub async fn cached_product(&self, id: &str) -> SyncResult<Option<ProductWithInventory>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM cached_products WHERE id = ?1");

        let product = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub async fn get_setting(&self, key: &str) -> SyncResult<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> Vec<SaleLineRequest> {
        vec![SaleLineRequest::new("prod-a", 2), SaleLineRequest::new("prod-b", 1)]
    }

    fn product(id: &str, name: &str, quantity: i64) -> ProductWithInventory {
        ProductWithInventory {
            id: id.into(),
            name: name.into(),
            description: None,
            category: "Snacks".into(),
            price_cents: 250,
            barcode: Some(format!("BC-{}", id)),
            quantity,
            min_stock_level: 10,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_add_and_list_pending_sales() {
        let store = OfflineStore::in_memory().await.unwrap();

        let first = store.add_pending_sale(lines()).await.unwrap();
        let second = store
            .add_pending_sale(vec![SaleLineRequest::new("prod-c", 5)])
            .await
            .unwrap();

        assert_eq!(first.status, PendingSaleStatus::Pending);

        let all = store.get_pending_sales(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[0].items, lines());
        assert_eq!(all[1].id, second.id);
        assert_eq!(store.count_pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_lines() {
        let store = OfflineStore::in_memory().await.unwrap();

        let err = store.add_pending_sale(vec![]).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        let err = store
            .add_pending_sale(vec![SaleLineRequest::new("prod-a", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(store.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_update_and_status_filter() {
        let store = OfflineStore::in_memory().await.unwrap();
        let a = store.add_pending_sale(lines()).await.unwrap();
        let b = store.add_pending_sale(lines()).await.unwrap();

        store
            .update_pending_sale(&a.id, PendingSaleUpdate::failed("Product not found: prod-a"))
            .await
            .unwrap();

        // Status-only update keeps the stored error
        store
            .update_pending_sale(
                &a.id,
                PendingSaleUpdate {
                    status: Some(PendingSaleStatus::Failed),
                    error: None,
                },
            )
            .await
            .unwrap();

        let failed = store
            .get_pending_sales(Some(PendingSaleStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("Product not found: prod-a"));

        let pending = store
            .get_pending_sales(Some(PendingSaleStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(
            counts,
            StatusCounts {
                pending: 1,
                syncing: 0,
                failed: 1
            }
        );
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let store = OfflineStore::in_memory().await.unwrap();
        let err = store
            .update_pending_sale("missing", PendingSaleUpdate::syncing())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_reset_failed() {
        let store = OfflineStore::in_memory().await.unwrap();
        let a = store.add_pending_sale(lines()).await.unwrap();
        let b = store.add_pending_sale(lines()).await.unwrap();

        assert!(store.delete_pending_sale(&a.id).await.unwrap());
        assert!(!store.delete_pending_sale(&a.id).await.unwrap());

        store
            .update_pending_sale(&b.id, PendingSaleUpdate::failed("timeout"))
            .await
            .unwrap();
        assert_eq!(store.count_pending().await.unwrap(), 0);

        assert_eq!(store.reset_failed().await.unwrap(), 1);
        let b = store.get_pending_sale(&b.id).await.unwrap().unwrap();
        assert_eq!(b.status, PendingSaleStatus::Pending);
        assert!(b.error.is_none());
    }

    #[tokio::test]
    async fn test_product_cache_is_replaced_wholesale() {
        let store = OfflineStore::in_memory().await.unwrap();

        store
            .replace_product_cache(&[product("a", "Chips", 12), product("b", "Apple", 3)])
            .await
            .unwrap();
        let cached = store.cached_products().await.unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].name, "Apple");

        let count = store
            .replace_product_cache(&[product("c", "Cola", 40)])
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(store.cached_product("a").await.unwrap().is_none());

        let cola = store.cached_product("c").await.unwrap().unwrap();
        assert_eq!(cola.quantity, 40);
        assert_eq!(cola.barcode.as_deref(), Some("BC-c"));
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let store = OfflineStore::in_memory().await.unwrap();
        assert!(store.get_setting("last_sync_at").await.unwrap().is_none());

        store.set_setting("last_sync_at", "one").await.unwrap();
        store.set_setting("last_sync_at", "two").await.unwrap();
        assert_eq!(
            store.get_setting("last_sync_at").await.unwrap().as_deref(),
            Some("two")
        );
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terminal").join("offline.db");

        let store = OfflineStore::open(&path).await.unwrap();
        let sale = store.add_pending_sale(lines()).await.unwrap();
        store.set_setting("terminal", "front-1").await.unwrap();
        store.close().await;

        let store = OfflineStore::open(&path).await.unwrap();
        let pending = store.get_pending_sales(None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, sale.id);
        assert_eq!(
            store.get_setting("terminal").await.unwrap().as_deref(),
            Some("front-1")
        );
    }

    #[tokio::test]
    async fn test_interrupted_sync_is_parked_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.db");

        let store = OfflineStore::open(&path).await.unwrap();
        let sale = store.add_pending_sale(lines()).await.unwrap();
        store
            .update_pending_sale(&sale.id, PendingSaleUpdate::syncing())
            .await
            .unwrap();
        store.close().await;

        let store = OfflineStore::open(&path).await.unwrap();
        let sale = store.get_pending_sale(&sale.id).await.unwrap().unwrap();
        assert_eq!(sale.status, PendingSaleStatus::Failed);
        assert_eq!(sale.error.as_deref(), Some(INTERRUPTED_ERROR));
    }
}
