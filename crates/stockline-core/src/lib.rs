//! # stockline-core: Domain Types for Stockline
//!
//! Everything the server and the offline client agree on: records, request
//! payloads, status enums, money and the error taxonomy. No I/O lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockline Architecture                           │
//! │                                                                         │
//! │  ┌───────────────────────────┐        ┌──────────────────────────────┐ │
//! │  │  apps/server (axum)       │◄─HTTP──│  stockline-sync (POS client) │ │
//! │  │  SaleProcessor, Queue     │        │  OfflineStore, Orchestrator  │ │
//! │  └─────────────┬─────────────┘        └──────────────┬───────────────┘ │
//! │                │                                     │                  │
//! │  ┌─────────────▼─────────────┐                       │                  │
//! │  │  stockline-db             │                       │                  │
//! │  │  Ledger, repositories     │                       │                  │
//! │  └─────────────┬─────────────┘                       │                  │
//! │                │                                     │                  │
//! │  ┌─────────────▼─────────────────────────────────────▼───────────────┐ │
//! │  │               ★ stockline-core (THIS CRATE) ★                     │ │
//! │  │   types • money • error • validation                              │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records and request payloads (Product, Sale, SyncQueueEntry, ...)
//! - [`money`] - Integer-cent money type
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation for sales and queue entries
//!
//! ## Example
//!
//! ```rust
//! use stockline_core::{validation::validate_sale_lines, SaleLineRequest};
//!
//! let lines = vec![SaleLineRequest::new("product-a", 3)];
//! assert!(validate_sale_lines(&lines).is_ok());
//! assert!(validate_sale_lines(&[]).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Queue transaction type for a replayed sale.
pub const TRANSACTION_SALE: &str = "sale";

/// Queue transaction type for a manual stock correction.
pub const TRANSACTION_INVENTORY_ADJUSTMENT: &str = "inventory_adjustment";

/// Reorder threshold given to new inventory records.
pub const DEFAULT_MIN_STOCK_LEVEL: i64 = 10;
