use super::response::ApiError;
use super::ApiState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Rejects requests without a matching `X-API-Key` header.
///
/// A no-op when no API key is configured.
pub async fn require_api_key(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() {
        return ApiError::unauthorized("API key is required").into_response();
    }
    if provided != expected {
        return ApiError::unauthorized("Invalid API key").into_response();
    }
    next.run(request).await
}
