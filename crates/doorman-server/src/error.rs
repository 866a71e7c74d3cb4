//! Error types of the gateway binary and its HTTP API.

use crate::config::ConfigError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the REST handlers as `{"detail": ...}` bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// Rejected request parameter.
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<doorman_core::Error> for ApiError {
    fn from(err: doorman_core::Error) -> Self {
        match err {
            doorman_core::Error::NotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failure to start or run the gateway.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorman_core::Error;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_core_error_mapping() {
        let err = ApiError::from(Error::NotFound("DOOR-404".into()));
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Device DOOR-404 not found"));

        let err = ApiError::from(Error::InvalidDoorId("a b".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
