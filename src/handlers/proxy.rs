use crate::{error::DashboardError, AppState};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Headers that keep every intermediary (CDN, browser, corporate proxy) from
/// storing the response.
const NO_STORE_HEADERS: [(HeaderName, &str); 4] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
    (header::CONTENT_TYPE, "application/json"),
];

/// GET|POST /api/analytics
///
/// 1. Forward the call to the upstream analytics endpoint as a POST.
/// 2. Check the upstream answered 2xx with a JSON body.
/// 3. Return that body byte-for-byte, marked as non-cacheable.
///
/// Any failure becomes `500 {"error": "..."}`, also non-cacheable.
pub async fn analytics(State(state): State<Arc<AppState>>) -> Response {
    match forward(&state).await {
        Ok(body) => (NO_STORE_HEADERS, body).into_response(),
        Err(e) => {
            tracing::error!("Analytics proxy upstream failure: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                NO_STORE_HEADERS,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn forward(state: &AppState) -> Result<Bytes, DashboardError> {
    let resp = state.client.post(&state.upstream_url).send().await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(DashboardError::NetworkFailure(format!(
            "API request failed with status {}",
            status.as_u16()
        )));
    }

    let body = resp.bytes().await?;
    serde_json::from_slice::<serde_json::Value>(&body).map_err(|e| {
        DashboardError::NetworkFailure(format!("upstream returned invalid JSON: {e}"))
    })?;

    Ok(body)
}
