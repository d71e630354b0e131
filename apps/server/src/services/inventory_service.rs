//! Inventory views and manual stock corrections.
//!
//! Quantity changes go through the ledger's `adjust`. The threshold update
//! only touches `min_stock_level`.

use tracing::info;

use stockline_core::validation::{validate_adjustment_delta, validate_min_stock_level};
use stockline_core::{CoreError, InventoryRecord, ProductWithInventory, ValidationError};
use stockline_db::{Database, DbError, Reservation};

use crate::error::{ServerError, ServerResult};

#[derive(Debug, Clone)]
pub struct InventoryService {
    db: Database,
}

impl InventoryService {
    pub fn new(db: Database) -> Self {
        InventoryService { db }
    }

    /// Active products with stock, by name.
    pub async fn list(
        &self,
        low_stock_only: bool,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> ServerResult<Vec<ProductWithInventory>> {
        let rows = self.db.products().list_with_inventory(low_stock_only).await?;

        Ok(rows
            .into_iter()
            .skip(skip.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    pub async fn get(&self, product_id: &str) -> ServerResult<ProductWithInventory> {
        self.db
            .products()
            .get_with_inventory(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }

    /// Sets the reorder threshold of an active product.
    pub async fn set_min_stock_level(
        &self,
        product_id: &str,
        min_stock_level: i64,
    ) -> ServerResult<ProductWithInventory> {
        validate_min_stock_level(min_stock_level)?;
        self.ensure_active(product_id).await?;

        self.db
            .inventory()
            .set_min_stock_level(product_id, min_stock_level)
            .await
            .map_err(|e| not_found_as_product(e, product_id))?;

        info!(product_id = %product_id, min_stock_level, "Reorder level updated");
        self.get(product_id).await
    }

    /// Applies a relative stock change to an active product.
    pub async fn adjust(&self, product_id: &str, delta: i64) -> ServerResult<InventoryRecord> {
        self.ensure_active(product_id).await?;

        let current = self
            .db
            .inventory()
            .get(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        validate_adjustment_delta(current.quantity, delta)?;

        let outcome = self
            .db
            .inventory()
            .adjust(product_id, delta)
            .await
            .map_err(|e| match e {
                // A concurrent adjustment moved the quantity past the pre-check.
                DbError::CheckViolation { .. } => ServerError::from(ValidationError::OutOfRange {
                    field: "delta".to_string(),
                }),
                e => not_found_as_product(e, product_id),
            })?;

        match outcome {
            Reservation::Applied(record) => Ok(record),
            Reservation::Insufficient {
                available,
                requested,
            } => Err(CoreError::NegativeAdjustment {
                resulting: available - requested,
            }
            .into()),
        }
    }

    async fn ensure_active(&self, product_id: &str) -> ServerResult<()> {
        self.db
            .products()
            .get_active(product_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()).into())
    }
}

fn not_found_as_product(err: DbError, product_id: &str) -> ServerError {
    if err.is_not_found() {
        CoreError::ProductNotFound(product_id.to_string()).into()
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_core::NewProduct;
    use stockline_db::DbConfig;

    async fn setup() -> (InventoryService, Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                name: "Rice".into(),
                description: None,
                category: "grocery".into(),
                price_cents: 329,
                barcode: None,
                initial_quantity: 6,
                min_stock_level: 5,
            })
            .await
            .unwrap();
        (InventoryService::new(db.clone()), db, product.id)
    }

    #[tokio::test]
    async fn test_adjust_and_negative_message() {
        let (service, _db, id) = setup().await;

        let record = service.adjust(&id, 4).await.unwrap();
        assert_eq!(record.quantity, 10);

        let err = service.adjust(&id, -11).await.unwrap_err();
        assert_eq!(err.to_string(), "Adjustment would result in negative inventory (-1)");
        assert_eq!(service.get(&id).await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_extreme_deltas_are_validation_errors() {
        let (service, _db, id) = setup().await;

        let err = service.adjust(&id, i64::MIN).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(err.to_string(), "Validation error: delta is out of range");

        let err = service.adjust(&id, i64::MAX).await.unwrap_err();
        assert!(matches!(err, ServerError::Core(CoreError::Validation(_))));

        assert_eq!(service.get(&id).await.unwrap().quantity, 6);
    }

    #[tokio::test]
    async fn test_threshold_update() {
        let (service, _db, id) = setup().await;

        let view = service.set_min_stock_level(&id, 2).await.unwrap();
        assert_eq!(view.min_stock_level, 2);
        assert_eq!(view.quantity, 6);
        assert!(service.list(true, None, None).await.unwrap().is_empty());

        assert!(service.set_min_stock_level(&id, -1).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_and_inactive_products() {
        let (service, db, id) = setup().await;

        let err = service.get("nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Product not found: nope");
        assert!(service.adjust("nope", 1).await.is_err());

        db.products().soft_delete(&id).await.unwrap();
        assert!(service.adjust(&id, 1).await.is_err());
        assert!(service.list(false, None, None).await.unwrap().is_empty());
    }
}
