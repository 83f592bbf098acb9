//! Gateway error types

use hlofe_types::IdError;
use thiserror::Error;

/// Errors raised while talking to the entity store
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid entity id: {0}")]
    InvalidId(#[from] IdError),

    #[error("Entity store unavailable: {0}")]
    Unavailable(String),

    #[error("Entity store request timed out: {0}")]
    Timeout(String),

    #[error("Entity store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed entity store response: {0}")]
    Decode(String),

    #[error("Token acquisition failed: {0}")]
    Token(String),

    #[error("Invalid entity store URL: {0}")]
    InvalidUrl(String),
}

impl GatewayError {
    /// Transport-level failure, as opposed to a definite answer from the store
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::Timeout(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
