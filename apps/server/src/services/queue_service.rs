//! # Server Sync Queue Service
//!
//! Drains the durable sync queue through handlers registered per
//! transaction type.
//!
//! ## Drain Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  process_all()                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pending entries, oldest first (created_at, rowid)                      │
//! │       │                                                                 │
//! │       ▼  for each entry                                                 │
//! │  claim()  pending → processing ── lost the race ──► skip                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  handlers[transaction_type]                                             │
//! │       ├── "sale"                  → SaleProcessor (SaleOrigin::Replay)  │
//! │       ├── "inventory_adjustment"  → Ledger adjust                       │
//! │       └── anything else           → Unknown transaction type            │
//! │       │                                                                 │
//! │       ├── Ok  → completed, processed_at                                 │
//! │       └── Err → failed, processed_at, error_message; keep going         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Completed entries are never picked up again, so running the drain twice
//! never deducts twice. Identical payloads enqueued twice are two entries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use stockline_core::validation::validate_transaction_type;
use stockline_core::{
    CoreError, CreateSaleRequest, InventoryAdjustment, QueueStatus, SyncQueueEntry,
    ValidationError, TRANSACTION_INVENTORY_ADJUSTMENT, TRANSACTION_SALE,
};
use stockline_db::Database;

use crate::error::ServerResult;
use crate::services::inventory_service::InventoryService;
use crate::services::sale_service::{SaleOrigin, SaleProcessor};

/// Error recorded on entries found in `processing` at startup.
pub const INTERRUPTED_ERROR: &str =
    "Interrupted during processing; check whether it was applied before re-queueing";

// =============================================================================
// Handlers
// =============================================================================

/// Executes one kind of queued transaction.
#[async_trait]
pub trait QueueHandler: Send + Sync {
    async fn handle(&self, entry: &SyncQueueEntry) -> ServerResult<()>;
}

/// Replays a queued sale through the processor.
pub struct SaleHandler {
    processor: SaleProcessor,
}

impl SaleHandler {
    pub fn new(processor: SaleProcessor) -> Self {
        SaleHandler { processor }
    }
}

#[async_trait]
impl QueueHandler for SaleHandler {
    async fn handle(&self, entry: &SyncQueueEntry) -> ServerResult<()> {
        let request: CreateSaleRequest = serde_json::from_str(&entry.payload)
            .map_err(|e| ValidationError::invalid_format("payload", e.to_string()))?;

        let receipt = self
            .processor
            .create_sale(request, SaleOrigin::Replay)
            .await?;

        debug!(entry_id = %entry.id, sale_id = %receipt.sale.id, "Queued sale applied");
        Ok(())
    }
}

/// Applies a queued manual stock correction.
pub struct InventoryAdjustmentHandler {
    inventory: InventoryService,
}

impl InventoryAdjustmentHandler {
    pub fn new(inventory: InventoryService) -> Self {
        InventoryAdjustmentHandler { inventory }
    }
}

#[async_trait]
impl QueueHandler for InventoryAdjustmentHandler {
    async fn handle(&self, entry: &SyncQueueEntry) -> ServerResult<()> {
        let adjustment: InventoryAdjustment = serde_json::from_str(&entry.payload)
            .map_err(|e| ValidationError::invalid_format("payload", e.to_string()))?;

        self.inventory
            .adjust(&adjustment.product_id, adjustment.delta)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Run Summary
// =============================================================================

/// Result of one `process_all` pass. Serialized as the response of
/// `POST /api/sync/process`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRunSummary {
    pub message: String,
    pub success: bool,
    pub processed: usize,
    pub failed: usize,
}

impl QueueRunSummary {
    fn empty() -> Self {
        QueueRunSummary {
            message: "No pending items to sync".to_string(),
            success: true,
            processed: 0,
            failed: 0,
        }
    }

    fn finished(processed: usize, failed: usize) -> Self {
        QueueRunSummary {
            message: format!("Sync complete. Processed: {}, Failed: {}", processed, failed),
            success: failed == 0,
            processed,
            failed,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// The sync queue with its handler registry.
#[derive(Clone)]
pub struct QueueService {
    db: Database,
    handlers: HashMap<String, Arc<dyn QueueHandler>>,
}

impl fmt::Debug for QueueService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("QueueService").field("handlers", &types).finish()
    }
}

impl QueueService {
    /// A queue with no handlers. Every entry fails as unknown.
    pub fn new(db: Database) -> Self {
        QueueService {
            db,
            handlers: HashMap::new(),
        }
    }

    /// A queue with the `sale` and `inventory_adjustment` handlers.
    pub fn with_default_handlers(db: Database, processor: SaleProcessor) -> Self {
        let inventory = InventoryService::new(db.clone());
        QueueService::new(db)
            .register(TRANSACTION_SALE, SaleHandler::new(processor))
            .register(
                TRANSACTION_INVENTORY_ADJUSTMENT,
                InventoryAdjustmentHandler::new(inventory),
            )
    }

    /// Registers (or replaces) the handler for a transaction type.
    pub fn register(mut self, transaction_type: &str, handler: impl QueueHandler + 'static) -> Self {
        self.handlers
            .insert(transaction_type.to_string(), Arc::new(handler));
        self
    }

    /// Appends a pending entry.
    pub async fn enqueue(&self, transaction_type: &str, payload: &str) -> ServerResult<SyncQueueEntry> {
        validate_transaction_type(transaction_type)?;

        let entry = self.db.sync_queue().enqueue(transaction_type, payload).await?;
        info!(
            entry_id = %entry.id,
            transaction_type = %entry.transaction_type,
            "Transaction queued"
        );
        Ok(entry)
    }

    /// Lists entries in creation order.
    pub async fn list(&self, status: Option<QueueStatus>) -> ServerResult<Vec<SyncQueueEntry>> {
        Ok(self.db.sync_queue().list(status).await?)
    }

    /// Processes every pending entry, oldest first.
    ///
    /// A failing entry is marked `failed` and the pass continues. A storage
    /// fault while claiming or recording an entry is logged and the pass
    /// moves on; an entry it leaves in `processing` is parked by
    /// [`QueueService::recover_interrupted`] on the next start.
    pub async fn process_all(&self) -> ServerResult<QueueRunSummary> {
        let queue = self.db.sync_queue();
        let pending = queue.get_pending().await?;

        if pending.is_empty() {
            debug!("Sync queue empty");
            return Ok(QueueRunSummary::empty());
        }

        info!(count = pending.len(), "Processing sync queue");

        let mut processed = 0;
        let mut failed = 0;

        for entry in pending {
            match queue.claim(&entry.id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(entry_id = %entry.id, "Entry claimed elsewhere, skipping");
                    continue;
                }
                Err(e) => {
                    error!(entry_id = %entry.id, error = %e, "Could not claim entry");
                    continue;
                }
            }

            match self.dispatch(&entry).await {
                Ok(()) => {
                    processed += 1;
                    if let Err(e) = queue.mark_completed(&entry.id).await {
                        error!(
                            entry_id = %entry.id,
                            error = %e,
                            "Entry applied but completion not recorded"
                        );
                    }
                }
                Err(e) => {
                    failed += 1;
                    let message = e.to_string();
                    warn!(
                        entry_id = %entry.id,
                        transaction_type = %entry.transaction_type,
                        error = %message,
                        "Queue entry failed"
                    );
                    if let Err(mark_err) = queue.mark_failed(&entry.id, &message).await {
                        error!(entry_id = %entry.id, error = %mark_err, "Could not record failure");
                    }
                }
            }
        }

        let summary = QueueRunSummary::finished(processed, failed);
        info!(processed, failed, "{}", summary.message);
        Ok(summary)
    }

    /// Parks entries left in `processing` by an earlier run as `failed`.
    ///
    /// Call once at startup, before the first drain. Such an entry may or may
    /// not have been applied, so it is never retried automatically.
    pub async fn recover_interrupted(&self) -> ServerResult<u64> {
        let parked = self.db.sync_queue().fail_processing(INTERRUPTED_ERROR).await?;
        if parked > 0 {
            warn!(count = parked, "Parked interrupted queue entries as failed");
        }
        Ok(parked)
    }

    async fn dispatch(&self, entry: &SyncQueueEntry) -> ServerResult<()> {
        let handler = self
            .handlers
            .get(entry.transaction_type.as_str())
            .ok_or_else(|| CoreError::UnknownTransactionType(entry.transaction_type.clone()))?;

        handler.handle(entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_core::{NewProduct, SaleLineRequest};
    use stockline_db::DbConfig;

    async fn setup() -> (QueueService, Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                name: "Milk".into(),
                description: None,
                category: "dairy".into(),
                price_cents: 139,
                barcode: None,
                initial_quantity: 10,
                min_stock_level: 2,
            })
            .await
            .unwrap();
        let queue = QueueService::with_default_handlers(db.clone(), SaleProcessor::new(db.clone()));
        (queue, db, product.id)
    }

    fn sale_payload(product_id: &str, quantity: i64) -> String {
        serde_json::to_string(&CreateSaleRequest::new(vec![SaleLineRequest::new(
            product_id, quantity,
        )]))
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_queue_message() {
        let (queue, _db, _) = setup().await;
        let summary = queue.process_all().await.unwrap();
        assert_eq!(summary.message, "No pending items to sync");
        assert!(summary.success);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_blank_type() {
        let (queue, _db, _) = setup().await;
        assert!(queue.enqueue("  ", "{}").await.is_err());
    }

    #[tokio::test]
    async fn test_process_applies_sales_once() {
        let (queue, db, product_id) = setup().await;
        queue.enqueue("sale", &sale_payload(&product_id, 3)).await.unwrap();

        let first = queue.process_all().await.unwrap();
        assert_eq!(first.processed, 1);
        assert_eq!(first.message, "Sync complete. Processed: 1, Failed: 0");

        let second = queue.process_all().await.unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.message, "No pending items to sync");

        let quantity = db.inventory().get(&product_id).await.unwrap().unwrap().quantity;
        assert_eq!(quantity, 7);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let (queue, db, product_id) = setup().await;
        queue.enqueue("sale", &sale_payload(&product_id, 2)).await.unwrap();
        let bad = queue.enqueue("sale", &sale_payload("gone", 1)).await.unwrap();
        queue.enqueue("sale", &sale_payload(&product_id, 1)).await.unwrap();
        let unknown = queue.enqueue("refund", "{}").await.unwrap();

        let summary = queue.process_all().await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 2);
        assert!(!summary.success);

        let failed = queue.list(Some(QueueStatus::Failed)).await.unwrap();
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].id, bad.id);
        assert_eq!(failed[0].error_message.as_deref(), Some("Product not found: gone"));
        assert_eq!(failed[1].id, unknown.id);
        assert_eq!(
            failed[1].error_message.as_deref(),
            Some("Unknown transaction type: refund")
        );

        let quantity = db.inventory().get(&product_id).await.unwrap().unwrap().quantity;
        assert_eq!(quantity, 7);
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_entry() {
        let (queue, _db, _) = setup().await;
        let entry = queue.enqueue("sale", "not json").await.unwrap();

        let summary = queue.process_all().await.unwrap();
        assert_eq!(summary.failed, 1);

        let stored = queue.list(None).await.unwrap();
        assert_eq!(stored[0].id, entry.id);
        assert_eq!(stored[0].status, QueueStatus::Failed);
        assert!(stored[0]
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Validation error: payload has invalid format"));
    }

    #[tokio::test]
    async fn test_inventory_adjustment_handler() {
        let (queue, db, product_id) = setup().await;
        let restock = serde_json::to_string(&InventoryAdjustment {
            product_id: product_id.clone(),
            delta: 5,
        })
        .unwrap();
        let overdraw = serde_json::to_string(&InventoryAdjustment {
            product_id: product_id.clone(),
            delta: -100,
        })
        .unwrap();

        queue.enqueue("inventory_adjustment", &restock).await.unwrap();
        queue.enqueue("inventory_adjustment", &overdraw).await.unwrap();

        let summary = queue.process_all().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);

        let failed = queue.list(Some(QueueStatus::Failed)).await.unwrap();
        assert_eq!(
            failed[0].error_message.as_deref(),
            Some("Adjustment would result in negative inventory (-85)")
        );
        assert_eq!(db.inventory().get(&product_id).await.unwrap().unwrap().quantity, 15);
    }

    #[tokio::test]
    async fn test_extreme_adjustment_fails_entry() {
        let (queue, db, product_id) = setup().await;
        let payload = format!(
            r#"{{"productId":"{}","delta":-9223372036854775808}}"#,
            product_id
        );
        let entry = queue.enqueue("inventory_adjustment", &payload).await.unwrap();

        let summary = queue.process_all().await.unwrap();
        assert_eq!(summary.failed, 1);

        let stored = db.sync_queue().get_by_id(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, QueueStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("Validation error: delta is out of range")
        );
        assert_eq!(db.inventory().get(&product_id).await.unwrap().unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_unrecorded_outcomes_do_not_abort_pass() {
        let (queue, db, product_id) = setup().await;
        let first = queue.enqueue("sale", &sale_payload(&product_id, 1)).await.unwrap();
        let second = queue.enqueue("sale", &sale_payload(&product_id, 2)).await.unwrap();

        // Storage refuses to record completions
        sqlx::query(
            r#"
            CREATE TRIGGER refuse_completion BEFORE UPDATE ON sync_queue
            WHEN NEW.status = 'completed'
            BEGIN SELECT RAISE(ABORT, 'disk full'); END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let summary = queue.process_all().await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(db.inventory().get(&product_id).await.unwrap().unwrap().quantity, 7);
        assert_eq!(
            queue.list(Some(QueueStatus::Processing)).await.unwrap().len(),
            2
        );

        sqlx::query("DROP TRIGGER refuse_completion")
            .execute(db.pool())
            .await
            .unwrap();

        // Next start parks them; a new drain never re-applies them
        assert_eq!(queue.recover_interrupted().await.unwrap(), 2);
        for id in [&first.id, &second.id] {
            let stored = db.sync_queue().get_by_id(id).await.unwrap().unwrap();
            assert_eq!(stored.status, QueueStatus::Failed);
            assert_eq!(stored.error_message.as_deref(), Some(INTERRUPTED_ERROR));
        }

        let again = queue.process_all().await.unwrap();
        assert_eq!(again.message, "No pending items to sync");
        assert_eq!(db.inventory().get(&product_id).await.unwrap().unwrap().quantity, 7);
    }

    #[tokio::test]
    async fn test_custom_handler_registration() {
        struct Noop;

        #[async_trait]
        impl QueueHandler for Noop {
            async fn handle(&self, _entry: &SyncQueueEntry) -> ServerResult<()> {
                Ok(())
            }
        }

        let (queue, _db, _) = setup().await;
        let queue = queue.register("audit", Noop);
        queue.enqueue("audit", "{}").await.unwrap();

        let summary = queue.process_all().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(
            queue.list(Some(QueueStatus::Completed)).await.unwrap().len(),
            1
        );
    }
}
