//! Error type for registry operations.

use thiserror::Error;

/// Errors produced by the document store and repositories.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
