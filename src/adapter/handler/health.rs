use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::AppState;

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /readyz
/// ティアストアへ到達できなければ 503 を返す。
pub async fn readyz(State(state): State<AppState>) -> Response {
    match state.list_tiers_uc.execute(true).await {
        Ok(tiers) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ready", "enabled_tiers": tiers.len()})),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "quota store is not reachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"status": "not_ready", "error": e.to_string()})),
            )
                .into_response()
        }
    }
}
