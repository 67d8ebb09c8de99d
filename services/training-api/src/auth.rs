use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-key";

/// Rejects the request before its body is read unless `x-key` equals the configured secret.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    let provided = request.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    match (state.api_key.as_deref(), provided) {
        (Some(expected), Some(got)) if expected == got => Ok(next.run(request).await),
        (expected, _) => {
            warn!(path = %request.uri().path(), key_configured = expected.is_some(), "credentials_rejected");
            Err(ApiError::Forbidden)
        }
    }
}
