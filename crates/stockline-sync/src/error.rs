//! # Sync Error Types
//!
//! Error types for the terminal side of Stockline.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Server              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Network        │  │  Rejected{status,detail}│ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  InvalidResponse        │ │
//! │  │  ConfigLoad/Save│  │  (retryable)    │  │  (4xx surfaces to UI)   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Offline Store  │  │   Validation    │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Store          │  │  Validation     │  │  ShuttingDown           │ │
//! │  │  MigrationFailed│  │  (from core)    │  │  ChannelError           │ │
//! │  │  NotFound       │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stockline_core::ValidationError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all client-side failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The server could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Server Errors
    // =========================================================================
    /// The server answered with a non-success status.
    ///
    /// `detail` is the server's `{"detail": ...}` message when present.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    /// The server answered 2xx with a body we could not read.
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Offline Store Errors
    // =========================================================================
    /// Offline store query failed.
    #[error("Offline store error: {0}")]
    Store(String),

    /// Offline store migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Record not found in the offline store.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Failed to encode or decode a stored JSON column.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Input rejected before reaching the store or the server.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Background task is shutting down.
    #[error("Sync orchestrator is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SyncError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        SyncError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if the server may accept the same request later.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - 5xx answers (the server rolled back and stayed up)
    ///
    /// ## Non-Retryable Errors
    /// - 4xx rejections (insufficient stock, unknown product, validation)
    /// - Configuration and store errors
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Timeout(_) => true,
            SyncError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the server refused the request on business grounds.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SyncError::Rejected { status, .. } if (400..500).contains(status))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
