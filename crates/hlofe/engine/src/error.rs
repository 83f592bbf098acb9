//! Engine error types

use hlofe_gateway::GatewayError;
use hlofe_types::{DescriptorError, EntityId, IdError};
use thiserror::Error;

/// A descriptor that validated but cannot be turned into entities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot compile `{attribute}`: {cause}")]
pub struct CompileError {
    /// Path of the offending descriptor attribute
    pub attribute: String,
    pub cause: String,
}

impl CompileError {
    pub fn new(attribute: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            cause: cause.into(),
        }
    }
}

/// Lifecycle operation errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Service not found: {0}")]
    NotFound(EntityId),

    #[error("Entity store error: {0}")]
    Store(GatewayError),

    #[error("Precondition failed: {0}")]
    Precondition(String),
}

impl From<GatewayError> for LifecycleError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidId(e) => LifecycleError::InvalidInput(e.to_string()),
            other => LifecycleError::Store(other),
        }
    }
}

impl From<DescriptorError> for LifecycleError {
    fn from(err: DescriptorError) -> Self {
        LifecycleError::InvalidInput(err.to_string())
    }
}

impl From<IdError> for LifecycleError {
    fn from(err: IdError) -> Self {
        LifecycleError::InvalidInput(err.to_string())
    }
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
