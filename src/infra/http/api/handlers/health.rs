use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

/// Authenticated liveness probe.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::IM_A_TEAPOT,
        Json(json!({ "message": "health good!" })),
    )
}
