//! # Error Types
//!
//! Domain-specific error types for stockline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockline-core (this file)                                            │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Malformed input                                │
//! │                                                                         │
//! │  stockline-db                                                          │
//! │  └── DbError          - Storage faults (PersistenceFailure)            │
//! │                                                                         │
//! │  apps/server                                                           │
//! │  └── ServerError      - HTTP status + {detail, success:false}          │
//! │                                                                         │
//! │  stockline-sync                                                        │
//! │  └── SyncError        - Network / rejection / local store              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages are user-facing. The POS shows them verbatim, so their wording is
//! part of the HTTP contract.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id does not resolve to an active product.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A sale line asked for more than the ledger holds.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale [{A, 3}, {B, 5}] with stock {A: 5, B: 2}
    ///      │
    ///      ▼
    /// reserve(A, -3) ✓   reserve(B, -5) ✗ available=2
    ///      │
    ///      ▼
    /// ROLLBACK (A is back to 5)
    ///      │
    ///      ▼
    /// "Insufficient stock for B. Available: 2, Requested: 5"
    /// ```
    #[error("Insufficient stock for {product_name}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// Sale id does not exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Sale is not in a state that allows the requested operation.
    #[error("Sale {sale_id} is already {current_status}")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// A manual adjustment would drive stock below zero.
    #[error("Adjustment would result in negative inventory ({resulting})")]
    NegativeAdjustment { resulting: i64 },

    /// Queue entry carries a transaction type with no registered handler.
    #[error("Unknown transaction type: {0}")]
    UnknownTransactionType(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value cannot be represented once applied (stock delta overflow).
    #[error("{field} is out of range")]
    OutOfRange { field: String },

    /// Invalid format (bad JSON payload, malformed filter value).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_name: "Widget B".to_string(),
            available: 2,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Widget B. Available: 2, Requested: 5"
        );
    }

    #[test]
    fn test_lookup_messages() {
        assert_eq!(
            CoreError::ProductNotFound("p-1".into()).to_string(),
            "Product not found: p-1"
        );
        assert_eq!(
            CoreError::UnknownTransactionType("refund".into()).to_string(),
            "Unknown transaction type: refund"
        );
        assert_eq!(
            CoreError::NegativeAdjustment { resulting: -4 }.to_string(),
            "Adjustment would result in negative inventory (-4)"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "items".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: items is required");
    }
}
