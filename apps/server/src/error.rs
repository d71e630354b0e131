//! Error types for the HTTP server.
//!
//! ```text
//! CoreError ─┐
//! DbError  ──┼──► ServerError ──► (StatusCode, {"detail": "...", "success": false})
//! Config   ──┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use stockline_core::{CoreError, ValidationError};
use stockline_db::DbError;

use crate::config::ConfigError;

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Business rule violation. The message is shown to the cashier as-is.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage fault. Any reservations made before it were rolled back.
    #[error("Persistence failure: {0}")]
    Persistence(#[from] DbError),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for ServerError {
    fn from(err: ValidationError) -> Self {
        ServerError::Core(CoreError::Validation(err))
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ValidationError::invalid_format("body", rejection.body_text()).into()
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ValidationError::invalid_format("query", rejection.body_text()).into()
    }
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Core(err) => match err {
                CoreError::ProductNotFound(_) | CoreError::SaleNotFound(_) => StatusCode::NOT_FOUND,
                CoreError::InsufficientStock { .. }
                | CoreError::InvalidSaleStatus { .. }
                | CoreError::NegativeAdjustment { .. }
                | CoreError::UnknownTransactionType(_)
                | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            },
            ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServerError::Persistence(_) | ServerError::Config(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub success: bool,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = ErrorBody {
            detail: self.to_string(),
            success: false,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers and services.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let insufficient = ServerError::from(CoreError::InsufficientStock {
            product_name: "B".into(),
            available: 2,
            requested: 5,
        });
        assert_eq!(insufficient.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            insufficient.to_string(),
            "Insufficient stock for B. Available: 2, Requested: 5"
        );

        let missing = ServerError::from(CoreError::ProductNotFound("p-9".into()));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "Product not found: p-9");

        let storage = ServerError::from(DbError::PoolExhausted);
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(ServerError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_validation_is_bad_request() {
        let err = ServerError::from(ValidationError::Required {
            field: "items".into(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Validation error: items is required");
    }
}
