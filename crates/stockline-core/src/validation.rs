//! # Validation Module
//!
//! Input checks that run before any inventory is touched.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP extractor (axum Json)   → malformed JSON                 │
//! │  Layer 2: THIS MODULE                  → empty sale, quantity ≤ 0       │
//! │  Layer 3: SQLite CHECK constraints     → quantity ≥ 0, quantity > 0     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::SaleLineRequest;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted queue transaction type.
const MAX_TRANSACTION_TYPE_LEN: usize = 64;

/// Validates a line quantity.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates the lines of a sale.
///
/// ## Rules
/// - At least one line
/// - Every line names a product
/// - Every quantity is positive
///
/// Repeated product ids are allowed. The ledger applies them in order.
///
/// ```rust
/// use stockline_core::{validation::validate_sale_lines, SaleLineRequest};
///
/// assert!(validate_sale_lines(&[SaleLineRequest::new("a", 1)]).is_ok());
/// assert!(validate_sale_lines(&[SaleLineRequest::new("a", 0)]).is_err());
/// ```
pub fn validate_sale_lines(lines: &[SaleLineRequest]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "productId".to_string(),
            });
        }
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

/// Validates a queue transaction type tag.
pub fn validate_transaction_type(transaction_type: &str) -> ValidationResult<()> {
    let transaction_type = transaction_type.trim();

    if transaction_type.is_empty() {
        return Err(ValidationError::Required {
            field: "transactionType".to_string(),
        });
    }

    if transaction_type.len() > MAX_TRANSACTION_TYPE_LEN {
        return Err(ValidationError::TooLong {
            field: "transactionType".to_string(),
            max: MAX_TRANSACTION_TYPE_LEN,
        });
    }

    Ok(())
}

/// Validates a reorder threshold.
pub fn validate_min_stock_level(level: i64) -> ValidationResult<()> {
    if level < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "minStockLevel".to_string(),
        });
    }

    Ok(())
}

/// Validates a relative stock change against the current quantity.
///
/// Rejects deltas that cannot be negated (`i64::MIN`) and results that do
/// not fit in an `i64`. Whether the result goes negative is the ledger's
/// call, not this one's.
pub fn validate_adjustment_delta(current: i64, delta: i64) -> ValidationResult<()> {
    if delta.checked_neg().is_none() || current.checked_add(delta).is_none() {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
        });
    }

    Ok(())
}
