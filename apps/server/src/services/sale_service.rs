//! # Sale Transaction Processor
//!
//! Turns a multi-line sale request into one atomic inventory mutation plus a
//! persisted sale.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CreateSaleRequest { items, saleDate? }                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. validate_sale_lines()          → 400, nothing touched               │
//! │  2. resolve active products        → 404 Product not found              │
//! │  3. lock_all(product ids)          (sorted, deduped)                    │
//! │  4. BEGIN                                                               │
//! │     for line in submitted order:                                        │
//! │        reserve(product, -qty) ──── Insufficient ──► ROLLBACK → 400      │
//! │  5. insert sale + items (price snapshot)                                │
//! │     COMMIT ─────────────────────── error ─────────► ROLLBACK → 500      │
//! │  6. release locks, return SaleReceipt                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Product lookups run before `BEGIN` so the transaction's first statement is
//! a write.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stockline_core::validation::validate_sale_lines;
use stockline_core::{
    CoreError, CreateSaleRequest, Money, Product, Sale, SaleItem, SaleLine, SaleReceipt,
    SaleStatus, SyncStatus,
};
use stockline_db::{Database, DbError, InventoryRepository, Reservation, SaleRepository};

use crate::error::ServerResult;

/// Default page size for sale listings.
pub const DEFAULT_SALE_LIMIT: i64 = 100;

/// Largest page a caller can ask for.
pub const MAX_SALE_LIMIT: i64 = 1000;

/// Sync status of every sale this processor persists. The server is the
/// system of record, so a sale is synced once it lands here regardless of
/// its [`SaleOrigin`].
pub const RECORDED_SYNC_STATUS: SyncStatus = SyncStatus::Synced;

// =============================================================================
// Types
// =============================================================================

/// Where a sale request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleOrigin {
    /// `POST /api/sales`
    Direct,
    /// `POST /api/pos/sale`
    Pos,
    /// A sync queue entry or a replayed offline sale.
    Replay,
}

impl SaleOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleOrigin::Direct => "direct",
            SaleOrigin::Pos => "pos",
            SaleOrigin::Replay => "replay",
        }
    }

}

/// A sale line whose stock could not be put back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreFailure {
    pub product_id: String,
    pub quantity: i64,
    pub error: String,
}

/// Outcome of deleting a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDeletion {
    pub message: String,
    pub sale_id: String,
    /// Lines whose quantity went back into stock.
    pub restored: usize,
    pub restore_failures: Vec<RestoreFailure>,
}

/// Outcome of voiding a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleVoid {
    #[serde(flatten)]
    pub receipt: SaleReceipt,
    pub restored: usize,
    pub restore_failures: Vec<RestoreFailure>,
}

// =============================================================================
// Processor
// =============================================================================

/// Executes sales against the inventory ledger.
#[derive(Debug, Clone)]
pub struct SaleProcessor {
    db: Database,
}

impl SaleProcessor {
    pub fn new(db: Database) -> Self {
        SaleProcessor { db }
    }

    /// Creates a sale, deducting every line or none.
    pub async fn create_sale(
        &self,
        request: CreateSaleRequest,
        origin: SaleOrigin,
    ) -> ServerResult<SaleReceipt> {
        validate_sale_lines(&request.items)?;

        // Resolve every product up front. Nothing is locked or written yet.
        let mut products: HashMap<String, Product> = HashMap::new();
        for line in &request.items {
            if products.contains_key(&line.product_id) {
                continue;
            }
            let product = self
                .db
                .products()
                .get_active(&line.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;
            products.insert(line.product_id.clone(), product);
        }

        let locks = self
            .db
            .inventory()
            .lock_products(request.items.iter().map(|l| l.product_id.as_str()))
            .await;

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();
        let mut items = Vec::with_capacity(request.items.len());
        let mut lines = Vec::with_capacity(request.items.len());
        let mut total = Money::zero();

        for (line_no, line) in request.items.iter().enumerate() {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            let outcome =
                match InventoryRepository::reserve(&mut tx, &locks, &line.product_id, -line.quantity)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_not_found() => {
                        return Err(CoreError::ProductNotFound(line.product_id.clone()).into())
                    }
                    Err(e) => return Err(e.into()),
                };

            if let Reservation::Insufficient {
                available,
                requested,
            } = outcome
            {
                tx.rollback().await.map_err(DbError::from)?;
                info!(
                    product_id = %line.product_id,
                    available,
                    requested,
                    origin = origin.as_str(),
                    "Sale rejected: insufficient stock"
                );
                return Err(CoreError::InsufficientStock {
                    product_name: product.name.clone(),
                    available,
                    requested,
                }
                .into());
            }

            let subtotal = product.price().multiply_quantity(line.quantity);
            total += subtotal;

            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: line.product_id.clone(),
                line_no: line_no as i64,
                quantity: line.quantity,
                unit_price_cents: product.price_cents,
                subtotal_cents: subtotal.cents(),
            };
            lines.push(SaleLine {
                id: item.id.clone(),
                product_id: item.product_id.clone(),
                product_name: Some(product.name.clone()),
                line_no: item.line_no,
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal_cents,
            });
            items.push(item);
        }

        let sale = Sale {
            id: sale_id,
            sale_date: request.sale_date.unwrap_or(now),
            total_cents: total.cents(),
            status: SaleStatus::Completed,
            sync_status: RECORDED_SYNC_STATUS,
            created_at: now,
            updated_at: now,
        };

        SaleRepository::insert_with_items(&mut tx, &sale, &items).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        drop(locks);

        info!(
            sale_id = %sale.id,
            total = %total,
            lines = items.len(),
            origin = origin.as_str(),
            "Sale created"
        );

        Ok(SaleReceipt { sale, items: lines })
    }

    /// Gets a sale with its lines.
    pub async fn get_sale(&self, sale_id: &str) -> ServerResult<SaleReceipt> {
        self.db
            .sales()
            .get_receipt(sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()).into())
    }

    /// Lists sales newest first. `days` keeps only sales from the last N days.
    pub async fn list_sales(
        &self,
        skip: Option<i64>,
        limit: Option<i64>,
        days: Option<i64>,
    ) -> ServerResult<Vec<SaleReceipt>> {
        let skip = skip.unwrap_or(0).max(0);
        let limit = limit.unwrap_or(DEFAULT_SALE_LIMIT).clamp(1, MAX_SALE_LIMIT);
        let since = days.filter(|d| *d > 0).map(|d| Utc::now() - Duration::days(d));

        Ok(self.db.sales().list(skip, limit, since).await?)
    }

    /// Deletes a sale, optionally returning its quantities to stock.
    ///
    /// Restoration is best-effort per line: failures are collected in the
    /// result and the sale is deleted regardless. Only the call whose
    /// `DELETE` removed a `completed` row restores; a voided sale already
    /// gave its stock back.
    pub async fn delete_sale(
        &self,
        sale_id: &str,
        restore_inventory: bool,
    ) -> ServerResult<SaleDeletion> {
        // Items cascade with the header, so read them first.
        let items = if restore_inventory {
            self.db.sales().get_items(sale_id).await?
        } else {
            Vec::new()
        };

        let status = match self.db.sales().delete(sale_id).await {
            Ok(status) => status,
            Err(e) if e.is_not_found() => {
                return Err(CoreError::SaleNotFound(sale_id.to_string()).into())
            }
            Err(e) => return Err(e.into()),
        };

        let (restored, restore_failures) =
            if restore_inventory && status == SaleStatus::Completed {
                self.restore_items(sale_id, &items).await
            } else {
                (0, Vec::new())
            };

        info!(
            sale_id = %sale_id,
            restored,
            failures = restore_failures.len(),
            "Sale deleted"
        );

        Ok(SaleDeletion {
            message: "Sale deleted successfully".to_string(),
            sale_id: sale_id.to_string(),
            restored,
            restore_failures,
        })
    }

    /// Voids a completed sale and puts its stock back.
    ///
    /// Only the call whose conditional update moved the sale to `voided`
    /// restores it.
    pub async fn void_sale(&self, sale_id: &str) -> ServerResult<SaleVoid> {
        // Read before the status flip: a delete racing in after it would
        // cascade the items away.
        let items = self.db.sales().get_items(sale_id).await?;

        if !self.db.sales().mark_voided(sale_id).await? {
            let sale = self
                .db
                .sales()
                .get_by_id(sale_id)
                .await?
                .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale_id.to_string(),
                current_status: sale.status.to_string(),
            }
            .into());
        }

        let (restored, restore_failures) = self.restore_items(sale_id, &items).await;

        info!(sale_id = %sale_id, restored, "Sale voided");

        Ok(SaleVoid {
            receipt: self.get_sale(sale_id).await?,
            restored,
            restore_failures,
        })
    }

    async fn restore_items(&self, sale_id: &str, items: &[SaleItem]) -> (usize, Vec<RestoreFailure>) {
        let ledger = self.db.inventory();
        let mut restored = 0;
        let mut failures = Vec::new();

        for item in items {
            let error = match ledger.adjust(&item.product_id, item.quantity).await {
                Ok(Reservation::Applied(record)) => {
                    debug!(
                        product_id = %item.product_id,
                        quantity = record.quantity,
                        "Stock restored"
                    );
                    restored += 1;
                    continue;
                }
                Ok(Reservation::Insufficient { available, .. }) => {
                    format!("Restore refused with {} available", available)
                }
                Err(e) => e.to_string(),
            };

            warn!(
                sale_id = %sale_id,
                product_id = %item.product_id,
                quantity = item.quantity,
                error = %error,
                "Failed to restore inventory"
            );
            failures.push(RestoreFailure {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                error,
            });
        }

        (restored, failures)
    }
}
