//! Bearer-token gate for back-office routes.
//!
//! Active only when `STOCKLINE_API_TOKEN` is set. Issuing tokens is outside
//! this server; it only compares the presented token with the configured one.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Rejects requests whose `Authorization: Bearer <token>` does not match.
pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ServerResult<Response> {
    if let Some(expected) = state.config.api_token.as_deref() {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        if presented != Some(expected) {
            warn!(path = %request.uri().path(), "Rejected request without valid token");
            return Err(ServerError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}
