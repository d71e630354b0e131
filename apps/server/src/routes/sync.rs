//! Sync queue endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use stockline_core::{QueueStatus, SyncQueueEntry};

use crate::error::ServerResult;
use crate::services::QueueRunSummary;
use crate::state::AppState;

/// Body of `POST /api/sync/queue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    #[serde(alias = "transaction_type")]
    pub transaction_type: String,
    /// JSON text, interpreted by the handler for `transaction_type`.
    pub payload: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListParams {
    #[serde(alias = "status_filter")]
    pub status_filter: Option<String>,
}

/// `POST /api/sync/queue`
pub async fn enqueue(
    State(state): State<AppState>,
    body: Result<Json<EnqueueRequest>, JsonRejection>,
) -> ServerResult<(StatusCode, Json<SyncQueueEntry>)> {
    let Json(request) = body?;
    let entry = state
        .queue
        .enqueue(&request.transaction_type, &request.payload)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// `GET /api/sync/queue?statusFilter=pending`
pub async fn list_queue(
    State(state): State<AppState>,
    params: Result<Query<QueueListParams>, QueryRejection>,
) -> ServerResult<Json<Vec<SyncQueueEntry>>> {
    let Query(params) = params?;
    let status = params
        .status_filter
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<QueueStatus>)
        .transpose()?;

    Ok(Json(state.queue.list(status).await?))
}

/// `POST /api/sync/process`
pub async fn process_queue(State(state): State<AppState>) -> ServerResult<Json<QueueRunSummary>> {
    Ok(Json(state.queue.process_all().await?))
}
