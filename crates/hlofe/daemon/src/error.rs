//! Error types for hlofe-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hlofe_engine::{LifecycleError, NotifyError};
use hlofe_gateway::GatewayError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Entity store client could not be built
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Notifier could not be built
    #[error("Notifier error: {0}")]
    Notifier(#[from] NotifyError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Operation not allowed in the current service state
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The entity store failed
    #[error("Entity store error: {0}")]
    BadGateway(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidInput(msg) => ApiError::BadRequest(msg),
            LifecycleError::Compile(e) => ApiError::BadRequest(e.to_string()),
            LifecycleError::NotFound(id) => ApiError::NotFound(format!("Service {} not found", id)),
            LifecycleError::Precondition(msg) => ApiError::Precondition(msg),
            LifecycleError::Store(e) => ApiError::BadGateway(e.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Precondition(_) => (StatusCode::CONFLICT, "PRECONDITION_FAILED"),
            ApiError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "STORE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
