//! Error type for the runtime adapter boundary.
//!
//! Every adapter operation reports failure through this enum; nothing
//! panics across the boundary.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the model runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An operation that requires a live model was called without one.
    #[error("no live model for {0}")]
    NoModel(Uuid),

    #[error("unsupported layer type: {0}")]
    UnsupportedLayer(String),

    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
