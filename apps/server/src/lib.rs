//! # Stockline Server
//!
//! HTTP API over the inventory ledger: sales, the sync queue and inventory
//! views.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Stockline Server                                │
//! │                                                                         │
//! │  POS terminal ──► axum Router ──► Services ──► stockline-db ──► SQLite  │
//! │  (stockline-sync)     │                          │                      │
//! │                       │                          └── ProductLocks       │
//! │                       └── bearer-token gate         (per-product mutex) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `STOCKLINE_BIND_ADDR` - listen address (default: 0.0.0.0:8000)
//! - `STOCKLINE_DATABASE_PATH` - SQLite file (default: ./stockline.db)
//! - `STOCKLINE_API_TOKEN` - bearer token for back-office routes (optional)
//! - `STOCKLINE_DB_MAX_CONNECTIONS` - pool size (default: 5)

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

// Re-exports
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use state::AppState;

/// Serves the application on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = routes::router(state);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
