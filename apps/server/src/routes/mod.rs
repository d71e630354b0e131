//! # HTTP Routes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OPEN                                                                   │
//! │    GET  /health                        → "OK"                           │
//! │    POST /api/pos/sale                  → SaleProcessor (Pos)            │
//! │                                                                         │
//! │  BEARER TOKEN (when configured)                                         │
//! │    POST   /api/sales                   → SaleProcessor (Direct)         │
//! │    GET    /api/sales                   → newest first                   │
//! │    GET    /api/sales/{id}                                               │
//! │    DELETE /api/sales/{id}              → restoreInventory (default true)│
//! │    POST   /api/sales/{id}/void                                          │
//! │    POST   /api/sync/queue              → enqueue                        │
//! │    GET    /api/sync/queue              → statusFilter                   │
//! │    POST   /api/sync/process            → drain                          │
//! │    GET    /api/inventory               → lowStock                       │
//! │    GET    /api/inventory/{productId}                                    │
//! │    PUT    /api/inventory/{productId}   → minStockLevel                  │
//! │    POST   /api/inventory/{productId}/adjust → delta                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod inventory;
pub mod sales;
pub mod sync;

use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/sales", get(sales::list_sales).post(sales::create_sale))
        .route(
            "/api/sales/{id}",
            get(sales::get_sale).delete(sales::delete_sale),
        )
        .route("/api/sales/{id}/void", post(sales::void_sale))
        .route(
            "/api/sync/queue",
            get(sync::list_queue).post(sync::enqueue),
        )
        .route("/api/sync/process", post(sync::process_queue))
        .route("/api/inventory", get(inventory::list_inventory))
        .route(
            "/api/inventory/{product_id}",
            get(inventory::get_inventory).put(inventory::update_inventory),
        )
        .route(
            "/api/inventory/{product_id}/adjust",
            post(inventory::adjust_inventory),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/pos/sale", post(sales::create_pos_sale))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    "OK"
}
