//! Liveness endpoint backed by a metadata store probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::context::AppContext;

/// `GET /health`: 200 when the store answers, 500 otherwise.
pub async fn health_check(State(ctx): State<AppContext>) -> Response {
    match ctx.photos.ping().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.public_message() })),
            )
                .into_response()
        }
    }
}
