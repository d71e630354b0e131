//! # Product Repository
//!
//! Catalog reads and writes. Products are never hard-deleted: sale lines
//! keep referencing them, so "delete" clears `is_active` instead.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use stockline_core::{NewProduct, Product, ProductWithInventory};

use crate::error::{DbError, DbResult};

/// Columns of the product/inventory join, shared by the list and get queries.
const PRODUCT_WITH_INVENTORY_COLUMNS: &str = r#"
    p.id, p.name, p.description, p.category, p.price_cents, p.barcode,
    i.quantity, i.min_stock_level, i.last_updated
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as(
            r#"
            SELECT id, name, description, category, price_cents, barcode,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product that can still be sold.
    pub async fn get_active(&self, id: &str) -> DbResult<Option<Product>> {
        Ok(self.get_by_id(id).await?.filter(|p| p.is_active))
    }

    /// Inserts a product together with its inventory row.
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            category: new.category.clone(),
            price_cents: new.price_cents,
            barcode: new.barcode.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, description, category, price_cents, barcode,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(&product.barcode)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, new.barcode.clone().unwrap_or_default())
            }
            other => other,
        })?;

        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, quantity, min_stock_level, last_updated)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&product.id)
        .bind(new.initial_quantity)
        .bind(new.min_stock_level)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Marks a product inactive. It stops resolving for new sales.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET is_active = 0, updated_at = ?2
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(id = %id, "Product deactivated");
        Ok(())
    }

    /// Lists active products with their stock, optionally only those at or
    /// below their reorder threshold.
    pub async fn list_with_inventory(&self, low_stock_only: bool) -> DbResult<Vec<ProductWithInventory>> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_WITH_INVENTORY_COLUMNS}
            FROM products p
            JOIN inventory i ON i.product_id = p.id
            WHERE p.is_active = 1
              AND (?1 = 0 OR i.quantity <= i.min_stock_level)
            ORDER BY p.name, p.id
            "#
        );

        let rows = sqlx::query_as(&sql)
            .bind(low_stock_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Gets one active product with its stock.
    pub async fn get_with_inventory(&self, id: &str) -> DbResult<Option<ProductWithInventory>> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_WITH_INVENTORY_COLUMNS}
            FROM products p
            JOIN inventory i ON i.product_id = p.id
            WHERE p.id = ?1 AND p.is_active = 1
            "#
        );

        let row = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
