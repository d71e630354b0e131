//! # Sale Repository
//!
//! Persistence for sale headers and their lines.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. CREATE  (inside the processor's transaction, after reservations)    │
//! │     └── insert_with_items() → Sale { status: completed } + SaleItems    │
//! │                                                                         │
//! │  2. READ                                                               │
//! │     └── get_receipt() / list()                                          │
//! │                                                                         │
//! │  3a. VOID   └── mark_voided() → status: voided (rows kept)              │
//! │  3b. DELETE └── delete()      → header gone, items cascade              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use stockline_core::{Sale, SaleItem, SaleLine, SaleReceipt, SaleStatus};

use crate::error::{DbError, DbResult};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a sale header and its items on the caller's connection.
    ///
    /// Called by the sale processor inside the same transaction that made the
    /// inventory reservations, so the sale and the stock change commit or
    /// roll back together.
    pub async fn insert_with_items(
        conn: &mut SqliteConnection,
        sale: &Sale,
        items: &[SaleItem],
    ) -> DbResult<()> {
        debug!(id = %sale.id, items = items.len(), total = sale.total_cents, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_date, total_cents, status, sync_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&sale.id)
        .bind(sale.sale_date)
        .bind(sale.total_cents)
        .bind(sale.status)
        .bind(sale.sync_status)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, line_no, quantity,
                    unit_price_cents, subtotal_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(item.line_no)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Gets a sale header by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as(
            r#"
            SELECT id, sale_date, total_cents, status, sync_status, created_at, updated_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets the raw items of a sale in line order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as(
            r#"
            SELECT id, sale_id, product_id, line_no, quantity,
                   unit_price_cents, subtotal_cents
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the lines of a sale joined with current product names.
    pub async fn get_lines(&self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as(
            r#"
            SELECT si.id, si.product_id, p.name AS product_name, si.line_no,
                   si.quantity, si.unit_price_cents, si.subtotal_cents
            FROM sale_items si
            LEFT JOIN products p ON p.id = si.product_id
            WHERE si.sale_id = ?1
            ORDER BY si.line_no
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Gets a sale together with its lines.
    pub async fn get_receipt(&self, id: &str) -> DbResult<Option<SaleReceipt>> {
        let Some(sale) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let items = self.get_lines(id).await?;
        Ok(Some(SaleReceipt { sale, items }))
    }

    /// Lists sales newest first.
    ///
    /// `since` limits the result to sales dated at or after it.
    pub async fn list(
        &self,
        skip: i64,
        limit: i64,
        since: Option<DateTime<Utc>>,
    ) -> DbResult<Vec<SaleReceipt>> {
        let sales: Vec<Sale> = sqlx::query_as(
            r#"
            SELECT id, sale_date, total_cents, status, sync_status, created_at, updated_at
            FROM sales
            WHERE (?1 IS NULL OR sale_date >= ?1)
            ORDER BY sale_date DESC, created_at DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(since)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        let mut receipts = Vec::with_capacity(sales.len());
        for sale in sales {
            let items = self.get_lines(&sale.id).await?;
            receipts.push(SaleReceipt { sale, items });
        }

        Ok(receipts)
    }

    /// Moves a completed sale to `voided`.
    ///
    /// Returns false if the sale exists but is already voided.
    pub async fn mark_voided(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET status = 'voided', updated_at = ?2
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a sale. Its items go with it.
    ///
    /// Returns the status the row had when this call removed it. Of two
    /// concurrent deletes, exactly one gets a status; the other gets
    /// `NotFound`.
    pub async fn delete(&self, id: &str) -> DbResult<SaleStatus> {
        let status: Option<SaleStatus> =
            sqlx::query_scalar("DELETE FROM sales WHERE id = ?1 RETURNING status")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let status = status.ok_or_else(|| DbError::not_found("Sale", id))?;

        debug!(id = %id, %status, "Sale deleted");
        Ok(status)
    }

    /// Counts all sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
