//! Sale endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use stockline_core::{CreateSaleRequest, SaleReceipt};

use crate::error::ServerResult;
use crate::services::{SaleDeletion, SaleOrigin, SaleVoid};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListSalesParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    /// Only sales from the last N days.
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSaleParams {
    #[serde(alias = "restore_inventory")]
    pub restore_inventory: Option<bool>,
}

/// `POST /api/sales`
pub async fn create_sale(
    State(state): State<AppState>,
    body: Result<Json<CreateSaleRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<SaleReceipt>)> {
    let Json(request) = body?;
    let receipt = state.sales.create_sale(request, SaleOrigin::Direct).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `GET /api/sales`
pub async fn list_sales(
    State(state): State<AppState>,
    params: Result<Query<ListSalesParams>, QueryRejection>,
) -> ServerResult<Json<Vec<SaleReceipt>>> {
    let Query(params) = params?;
    let sales = state
        .sales
        .list_sales(params.skip, params.limit, params.days)
        .await?;
    Ok(Json(sales))
}

/// `GET /api/sales/{id}`
pub async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
) -> ServerResult<Json<SaleReceipt>> {
    Ok(Json(state.sales.get_sale(&sale_id).await?))
}

/// `DELETE /api/sales/{id}?restoreInventory=true`
pub async fn delete_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
    params: Result<Query<DeleteSaleParams>, QueryRejection>,
) -> ServerResult<Json<SaleDeletion>> {
    let Query(params) = params?;
    let deletion = state
        .sales
        .delete_sale(&sale_id, params.restore_inventory.unwrap_or(true))
        .await?;
    Ok(Json(deletion))
}

/// `POST /api/sales/{id}/void`
pub async fn void_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<String>,
) -> ServerResult<Json<SaleVoid>> {
    Ok(Json(state.sales.void_sale(&sale_id).await?))
}

/// `POST /api/pos/sale`
///
/// Same processing as `POST /api/sales`. Terminals post here without a token.
pub async fn create_pos_sale(
    State(state): State<AppState>,
    body: Result<Json<CreateSaleRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<SaleReceipt>)> {
    let Json(request) = body?;
    let receipt = state.sales.create_sale(request, SaleOrigin::Pos).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
