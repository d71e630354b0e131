//! # Domain Types
//!
//! Records and payloads shared by the server, its database layer and the POS
//! client.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SERVER RECORDS                                                         │
//! │                                                                         │
//! │  ┌───────────────┐ 1:1 ┌─────────────────┐                              │
//! │  │   Product     │────►│ InventoryRecord │  quantity ≥ 0                │
//! │  │  id (UUID)    │     │ min_stock_level │  mutated only by the ledger  │
//! │  │  price_cents  │     └─────────────────┘                              │
//! │  └───────┬───────┘                                                      │
//! │          │ referenced by (soft delete keeps history intact)             │
//! │  ┌───────▼───────┐ 1:N ┌─────────────────┐                              │
//! │  │   SaleItem    │◄────│      Sale       │  completed | voided          │
//! │  │ price snapshot│     │  total_cents    │                              │
//! │  └───────────────┘     └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐  pending → processing → completed | failed         │
//! │  │ SyncQueueEntry  │  never deleted (audit trail)                       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  CLIENT RECORDS                                                         │
//! │  ┌─────────────────┐  pending → syncing → (deleted) | failed            │
//! │  │  PendingSale    │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! JSON uses camelCase field names on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Product & Inventory
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_cents: i64,
    pub barcode: Option<String>,
    /// Soft-delete flag. Inactive products cannot be sold.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Stock ledger row for a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub product_id: String,
    pub quantity: i64,
    /// Advisory reorder threshold.
    pub min_stock_level: i64,
    pub last_updated: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }
}

/// A product joined with its inventory row.
///
/// This is what `GET /api/inventory` returns and what the POS client caches
/// for offline browsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ProductWithInventory {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_cents: i64,
    pub barcode: Option<String>,
    pub quantity: i64,
    pub min_stock_level: i64,
    pub last_updated: DateTime<Utc>,
}

impl ProductWithInventory {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock_level
    }
}

/// Input for creating a product together with its opening stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub price_cents: i64,
    #[serde(default)]
    pub barcode: Option<String>,
    pub initial_quantity: i64,
    #[serde(default = "default_min_stock_level")]
    pub min_stock_level: i64,
}

fn default_min_stock_level() -> i64 {
    crate::DEFAULT_MIN_STOCK_LEVEL
}

// =============================================================================
// Statuses
// =============================================================================

/// Lifecycle of a persisted sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    #[default]
    Completed,
    Voided,
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleStatus::Completed => write!(f, "completed"),
            SaleStatus::Voided => write!(f, "voided"),
        }
    }
}

/// Where a sale stands relative to the server of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Synced,
    Pending,
    Failed,
}

/// Status of a server-side sync queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl FromStr for QueueStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown queue status '{}'", other),
            )),
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Processing => write!(f, "processing"),
            QueueStatus::Completed => write!(f, "completed"),
            QueueStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status of a sale waiting in the client's offline store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PendingSaleStatus {
    #[default]
    Pending,
    Syncing,
    Failed,
}

impl fmt::Display for PendingSaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingSaleStatus::Pending => write!(f, "pending"),
            PendingSaleStatus::Syncing => write!(f, "syncing"),
            PendingSaleStatus::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Sales
// =============================================================================

/// A persisted sale header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    /// When the sale happened. For replayed offline sales this is the time
    /// the terminal recorded it, not the time it reached the server.
    pub sale_date: DateTime<Utc>,
    pub total_cents: i64,
    pub status: SaleStatus,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line of a sale with its price frozen at sale time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Position in the submitted request, starting at 0.
    pub line_no: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// Read view of a sale item joined with the product's current name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub id: String,
    pub product_id: String,
    pub product_name: Option<String>,
    pub line_no: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// A sale with its lines, as returned by the sale endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleLine>,
}

// =============================================================================
// Requests
// =============================================================================

/// One requested line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineRequest {
    #[serde(alias = "product_id")]
    pub product_id: String,
    pub quantity: i64,
}

impl SaleLineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLineRequest {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Body of `POST /api/sales`, `POST /api/pos/sale` and `sale` queue payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub items: Vec<SaleLineRequest>,
    /// Original time of an offline sale. Defaults to the time of processing.
    #[serde(default, alias = "sale_date", skip_serializing_if = "Option::is_none")]
    pub sale_date: Option<DateTime<Utc>>,
}

impl CreateSaleRequest {
    pub fn new(items: Vec<SaleLineRequest>) -> Self {
        CreateSaleRequest {
            items,
            sale_date: None,
        }
    }

    pub fn with_sale_date(mut self, sale_date: DateTime<Utc>) -> Self {
        self.sale_date = Some(sale_date);
        self
    }
}

/// Body of `POST /api/inventory/{id}/adjust` and `inventory_adjustment`
/// queue payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustment {
    pub product_id: String,
    pub delta: i64,
}

// =============================================================================
// Sync Queue (server)
// =============================================================================

/// A durable, status-tracked queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    pub id: String,
    pub transaction_type: String,
    /// Opaque JSON text interpreted by the handler for `transaction_type`.
    pub payload: String,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

// =============================================================================
// Offline Store (client)
// =============================================================================

/// A sale recorded on the terminal while the server was unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSale {
    pub id: String,
    pub items: Vec<SaleLineRequest>,
    pub created_at: DateTime<Utc>,
    pub status: PendingSaleStatus,
    pub error: Option<String>,
}

impl PendingSale {
    /// The request replayed against the server, carrying the offline
    /// timestamp as the sale date.
    pub fn to_request(&self) -> CreateSaleRequest {
        CreateSaleRequest::new(self.items.clone()).with_sale_date(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_request_wire_format() {
        let json = r#"{"items":[{"productId":"a","quantity":3}]}"#;
        let req: CreateSaleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.items, vec![SaleLineRequest::new("a", 3)]);
        assert!(req.sale_date.is_none());

        let out = serde_json::to_value(&req).unwrap();
        assert!(out.get("saleDate").is_none());
    }

    #[test]
    fn test_sale_request_accepts_snake_case_payloads() {
        let json = r#"{"items":[{"product_id":"a","quantity":2}],"sale_date":"2024-03-01T10:00:00Z"}"#;
        let req: CreateSaleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.items[0].product_id, "a");
        assert!(req.sale_date.is_some());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&QueueStatus::Processing).unwrap(),
            "\"processing\""
        );
        let parsed: PendingSaleStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, PendingSaleStatus::Failed);
    }

    #[test]
    fn test_queue_status_from_str() {
        assert_eq!("pending".parse::<QueueStatus>().unwrap(), QueueStatus::Pending);
        assert_eq!("Failed".parse::<QueueStatus>().unwrap(), QueueStatus::Failed);
        assert!("done".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn test_low_stock_threshold_is_inclusive() {
        let record = InventoryRecord {
            product_id: "p".into(),
            quantity: 10,
            min_stock_level: 10,
            last_updated: Utc::now(),
        };
        assert!(record.is_low_stock());
    }

    #[test]
    fn test_pending_sale_replays_with_offline_timestamp() {
        let created_at = Utc::now() - chrono::Duration::hours(3);
        let pending = PendingSale {
            id: "local-1".into(),
            items: vec![SaleLineRequest::new("a", 1)],
            created_at,
            status: PendingSaleStatus::Pending,
            error: None,
        };
        assert_eq!(pending.to_request().sale_date, Some(created_at));
    }

    #[test]
    fn test_receipt_flattens_sale_header() {
        let now = Utc::now();
        let receipt = SaleReceipt {
            sale: Sale {
                id: "s-1".into(),
                sale_date: now,
                total_cents: 500,
                status: SaleStatus::Completed,
                sync_status: SyncStatus::Synced,
                created_at: now,
                updated_at: now,
            },
            items: vec![],
        };
        let value = serde_json::to_value(&receipt).unwrap();
        assert_eq!(value["id"], "s-1");
        assert_eq!(value["totalCents"], 500);
        assert_eq!(value["status"], "completed");
    }
}
