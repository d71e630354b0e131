//! # Inventory Ledger
//!
//! The only code that changes `inventory.quantity`.
//!
//! ## Reserve-if-available
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  caller holds ProductLockSet covering product_id                        │
//! │  caller has an open transaction (Processor) or we open one (adjust)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE inventory                                                       │
//! │     SET quantity = quantity + :delta, last_updated = :now               │
//! │   WHERE product_id = :id AND quantity + :delta >= 0                     │
//! │  RETURNING …                                                            │
//! │       │                                                                 │
//! │       ├── 1 row  → Reservation::Applied(new record)                     │
//! │       │                                                                 │
//! │       └── 0 rows → SELECT quantity                                      │
//! │                      ├── row    → Reservation::Insufficient{available}  │
//! │                      └── no row → DbError::NotFound                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are one statement, so nothing can interleave
//! between them. Issuing the write first also means the transaction takes
//! SQLite's write lock before it reads anything, which keeps concurrent
//! writers on the busy-timeout path instead of failing on a stale snapshot.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};

use stockline_core::InventoryRecord;

use crate::error::{DbError, DbResult};
use crate::locks::{ProductLockSet, ProductLocks};

/// Outcome of a ledger mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// The delta was applied. Carries the updated record.
    Applied(InventoryRecord),
    /// Applying the delta would make the quantity negative. Nothing was written.
    Insufficient { available: i64, requested: i64 },
}

impl Reservation {
    pub fn is_applied(&self) -> bool {
        matches!(self, Reservation::Applied(_))
    }
}

/// Repository over the `inventory` table.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
    locks: Arc<ProductLocks>,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool, locks: Arc<ProductLocks>) -> Self {
        InventoryRepository { pool, locks }
    }

    /// Applies `delta` to the product's quantity inside the caller's
    /// transaction.
    ///
    /// `locks` must cover `product_id`. A negative delta that cannot be
    /// satisfied yields [`Reservation::Insufficient`] and writes nothing.
    pub async fn reserve(
        conn: &mut SqliteConnection,
        locks: &ProductLockSet,
        product_id: &str,
        delta: i64,
    ) -> DbResult<Reservation> {
        if !locks.covers(product_id) {
            return Err(DbError::Internal(format!(
                "ledger mutation on {} without holding its lock",
                product_id
            )));
        }

        let requested = delta.checked_neg().ok_or_else(|| DbError::CheckViolation {
            message: format!("inventory delta {} out of range", delta),
        })?;

        // Largest quantity the delta can be added to without leaving i64.
        let ceiling = i64::MAX - delta.max(0);
        let now = Utc::now();

        let updated: Option<InventoryRecord> = sqlx::query_as(
            r#"
            UPDATE inventory SET
                quantity = quantity + ?2,
                last_updated = ?3
            WHERE product_id = ?1 AND quantity <= ?4 AND quantity + ?2 >= 0
            RETURNING product_id, quantity, min_stock_level, last_updated
            "#,
        )
        .bind(product_id)
        .bind(delta)
        .bind(now)
        .bind(ceiling)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(record) = updated {
            debug!(
                product_id = %product_id,
                delta,
                quantity = record.quantity,
                "Inventory updated"
            );
            return Ok(Reservation::Applied(record));
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM inventory WHERE product_id = ?1")
                .bind(product_id)
                .fetch_optional(&mut *conn)
                .await?;

        match available {
            Some(available) if available > ceiling => Err(DbError::CheckViolation {
                message: format!("inventory quantity {} + {} overflows", available, delta),
            }),
            Some(available) => {
                debug!(
                    product_id = %product_id,
                    available,
                    requested,
                    "Insufficient stock"
                );
                Ok(Reservation::Insufficient {
                    available,
                    requested,
                })
            }
            None => Err(DbError::not_found("Inventory", product_id)),
        }
    }

    /// Applies `delta` as a standalone operation with its own lock and
    /// transaction. Used for manual corrections and sale restoration.
    pub async fn adjust(&self, product_id: &str, delta: i64) -> DbResult<Reservation> {
        let locks = self.locks.lock(product_id).await;
        let mut tx = self.pool.begin().await?;

        let outcome = Self::reserve(&mut tx, &locks, product_id, delta).await?;

        match &outcome {
            Reservation::Applied(record) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                info!(
                    product_id = %product_id,
                    delta,
                    quantity = record.quantity,
                    "Inventory adjusted"
                );
            }
            Reservation::Insufficient { .. } => {
                tx.rollback()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            }
        }

        Ok(outcome)
    }

    /// Acquires the product locks for a multi-product operation.
    pub async fn lock_products<I, S>(&self, product_ids: I) -> ProductLockSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.locks.lock_all(product_ids).await
    }

    /// Gets the inventory record for a product.
    pub async fn get(&self, product_id: &str) -> DbResult<Option<InventoryRecord>> {
        let record = sqlx::query_as(
            r#"
            SELECT product_id, quantity, min_stock_level, last_updated
            FROM inventory
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Updates the advisory reorder threshold. Quantity is untouched.
    pub async fn set_min_stock_level(
        &self,
        product_id: &str,
        min_stock_level: i64,
    ) -> DbResult<InventoryRecord> {
        let record: Option<InventoryRecord> = sqlx::query_as(
            r#"
            UPDATE inventory SET
                min_stock_level = ?2,
                last_updated = ?3
            WHERE product_id = ?1
            RETURNING product_id, quantity, min_stock_level, last_updated
            "#,
        )
        .bind(product_id)
        .bind(min_stock_level)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or_else(|| DbError::not_found("Inventory", product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use stockline_core::NewProduct;

    async fn seeded(quantity: i64) -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                name: "Widget".into(),
                description: None,
                category: "test".into(),
                price_cents: 250,
                barcode: None,
                initial_quantity: quantity,
                min_stock_level: 2,
            })
            .await
            .unwrap();
        (db, product.id)
    }

    #[tokio::test]
    async fn test_adjust_applies_delta() {
        let (db, id) = seeded(5).await;

        let outcome = db.inventory().adjust(&id, -3).await.unwrap();
        match outcome {
            Reservation::Applied(record) => assert_eq!(record.quantity, 2),
            other => panic!("expected applied, got {:?}", other),
        }

        let outcome = db.inventory().adjust(&id, 10).await.unwrap();
        assert!(outcome.is_applied());
        assert_eq!(db.inventory().get(&id).await.unwrap().unwrap().quantity, 12);
    }

    #[tokio::test]
    async fn test_adjust_refuses_negative_result() {
        let (db, id) = seeded(2).await;

        let outcome = db.inventory().adjust(&id, -5).await.unwrap();
        assert_eq!(
            outcome,
            Reservation::Insufficient {
                available: 2,
                requested: 5
            }
        );
        assert_eq!(db.inventory().get(&id).await.unwrap().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_adjust_to_exactly_zero() {
        let (db, id) = seeded(4).await;
        assert!(db.inventory().adjust(&id, -4).await.unwrap().is_applied());
        assert_eq!(db.inventory().get(&id).await.unwrap().unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (db, _) = seeded(1).await;
        let err = db.inventory().adjust("missing", -1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_reserve_requires_lock() {
        let (db, id) = seeded(3).await;
        let other = db.locks().lock("someone-else").await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = InventoryRepository::reserve(&mut conn, &other, &id, -1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Internal(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_deltas_are_refused() {
        let (db, id) = seeded(3).await;

        let err = db.inventory().adjust(&id, i64::MIN).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        let err = db.inventory().adjust(&id, i64::MAX).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));

        let record = db.inventory().get(&id).await.unwrap().unwrap();
        assert_eq!(record.quantity, 3);

        // The largest delta that still fits is applied as usual
        let outcome = db.inventory().adjust(&id, i64::MAX - 3).await.unwrap();
        assert!(outcome.is_applied());
        assert_eq!(db.inventory().get(&id).await.unwrap().unwrap().quantity, i64::MAX);
    }

    #[tokio::test]
    async fn test_set_min_stock_level() {
        let (db, id) = seeded(3).await;
        let record = db.inventory().set_min_stock_level(&id, 7).await.unwrap();
        assert_eq!(record.min_stock_level, 7);
        assert_eq!(record.quantity, 3);
        assert!(record.is_low_stock());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adjustments_never_go_negative() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("ledger.db")).max_connections(8))
            .await
            .unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                name: "Scarce".into(),
                description: None,
                category: "test".into(),
                price_cents: 100,
                barcode: None,
                initial_quantity: 10,
                min_stock_level: 0,
            })
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..25 {
            let ledger = db.inventory();
            let id = product.id.clone();
            tasks.push(tokio::spawn(async move { ledger.adjust(&id, -1).await }));
        }

        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().is_applied() {
                applied += 1;
            }
        }

        assert_eq!(applied, 10);
        assert_eq!(
            db.inventory().get(&product.id).await.unwrap().unwrap().quantity,
            0
        );
    }
}
