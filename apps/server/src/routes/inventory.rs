//! Inventory endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use stockline_core::ProductWithInventory;

use crate::error::ServerResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryListParams {
    #[serde(default, alias = "low_stock")]
    pub low_stock: bool,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

/// Body of `PUT /api/inventory/{productId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInventoryRequest {
    #[serde(alias = "min_stock_level")]
    pub min_stock_level: i64,
}

/// Body of `POST /api/inventory/{productId}/adjust`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustInventoryRequest {
    /// Positive to add, negative to remove.
    pub delta: i64,
}

/// `GET /api/inventory?lowStock=true`
pub async fn list_inventory(
    State(state): State<AppState>,
    params: Result<Query<InventoryListParams>, QueryRejection>,
) -> ServerResult<Json<Vec<ProductWithInventory>>> {
    let Query(params) = params?;
    let rows = state
        .inventory
        .list(params.low_stock, params.skip, params.limit)
        .await?;
    Ok(Json(rows))
}

/// `GET /api/inventory/{productId}`
pub async fn get_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ServerResult<Json<ProductWithInventory>> {
    Ok(Json(state.inventory.get(&product_id).await?))
}

/// `PUT /api/inventory/{productId}`
pub async fn update_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    body: Result<Json<UpdateInventoryRequest>, JsonRejection>,
) -> ServerResult<Json<ProductWithInventory>> {
    let Json(request) = body?;
    let view = state
        .inventory
        .set_min_stock_level(&product_id, request.min_stock_level)
        .await?;
    Ok(Json(view))
}

/// `POST /api/inventory/{productId}/adjust`
pub async fn adjust_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    body: Result<Json<AdjustInventoryRequest>, JsonRejection>,
) -> ServerResult<Json<ProductWithInventory>> {
    let Json(request) = body?;
    state.inventory.adjust(&product_id, request.delta).await?;
    Ok(Json(state.inventory.get(&product_id).await?))
}
