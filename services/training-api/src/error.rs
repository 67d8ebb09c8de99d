//! HTTP-facing errors. Every failure class maps to one fixed status and `detail` text;
//! the specific cause is only logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use trainer_core::{ConsistencyError, MalformedConfigError, StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid credentials")]
    Forbidden,
    #[error("configuration rejected: {0:#}")]
    Configure(anyhow::Error),
    #[error("invalid training request: {0}")]
    BadRequest(String),
    #[error("no training procedure registered for job_id {job_id}")]
    NotFound { job_id: String },
    #[error("inconsistent training payload: {0}")]
    Inconsistent(String),
    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Configure(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Inconsistent(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Text returned to the client.
    pub fn detail(&self) -> String {
        match self {
            Self::Forbidden => "Could not validate credentials".into(),
            Self::Configure(_) => "Failed to register the training procedure".into(),
            Self::BadRequest(_) => "Invalid training request".into(),
            Self::NotFound { job_id } => format!("No training procedure registered for job_id: {job_id}"),
            Self::Inconsistent(_) => "Training payload is inconsistent with the registered configuration".into(),
            Self::Internal(_) => "Failed to run the training procedure".into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { job_id, .. } => Self::NotFound { job_id },
            StoreError::InvalidJobId(id) => Self::BadRequest(format!("invalid job_id {id:?}")),
            other => Self::Internal(other.into()),
        }
    }
}

impl From<ConsistencyError> for ApiError {
    fn from(err: ConsistencyError) -> Self {
        Self::Inconsistent(err.to_string())
    }
}

/// Stored documents that fail to parse map to 500.
impl From<MalformedConfigError> for ApiError {
    fn from(err: MalformedConfigError) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.detail() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_by_class() {
        let err: ApiError = StoreError::NotFound { job_id: "job".into(), document: "model" }.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.detail(), "No training procedure registered for job_id: job");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ApiError = StoreError::Persistence { path: "x".into(), source: io }.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn every_consistency_error_is_unprocessable() {
        let err: ApiError = ConsistencyError::MissingField { field: "model" }.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let err: ApiError = ConsistencyError::UnexpectedParameter { name: "fc2.bias".into() }.into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("fc2.bias"));
        assert!(!err.detail().contains("fc2.bias"));
    }

    #[test]
    fn malformed_stored_document_is_a_server_fault() {
        let err: ApiError = MalformedConfigError::new("model", "expected a mapping, found list").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "Failed to run the training procedure");
        assert!(err.to_string().contains("malformed model document"));
    }
}
