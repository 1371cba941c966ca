//! API error type and its HTTP mapping.
//!
//! Every handler catches at its own boundary; an error never crosses into
//! another request's handling and nothing is retried.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ml_runtime::RuntimeError;
use registry::RegistryError;
use thiserror::Error;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, or expired credentials.
    #[error("{0}")]
    Auth(String),

    /// Ownership or role violation.
    #[error("{0}")]
    Permission(String),

    /// Referenced document does not exist.
    #[error("{0}")]
    NotFound(String),

    /// An adapter operation was requested without a live model. Mapped to
    /// 400: the client asked to train or predict before initializing.
    #[error("{0}")]
    NoModel(String),

    /// Everything else, surfaced with its message.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::NoModel(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(msg) => Self::NotFound(msg),
            RegistryError::Permission(msg) => Self::Permission(msg),
            RegistryError::DuplicateName(name) => {
                Self::Validation(format!("name already in use: {name}"))
            }
            RegistryError::Validation(msg) => Self::Validation(msg),
            RegistryError::Storage(e) => Self::Internal(e.to_string()),
            RegistryError::Serde(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NoModel(id) => {
                Self::NoModel(format!("no live model for {id}; initialize it first"))
            }
            RuntimeError::UnsupportedLayer(_)
            | RuntimeError::InvalidArchitecture(_)
            | RuntimeError::InvalidInput(_)
            | RuntimeError::InvalidHyperparameters(_) => Self::Validation(err.to_string()),
            RuntimeError::Checkpoint(_) | RuntimeError::Io(_) | RuntimeError::Serde(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Auth("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Permission("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_no_model_maps_to_bad_request() {
        let err: ApiError = RuntimeError::NoModel(Uuid::new_v4()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_duplicate_name_maps_to_bad_request() {
        let err: ApiError = RegistryError::DuplicateName("sales".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
