//! Model runtime adapter.
//!
//! Translates declarative architecture descriptors into live models built
//! on the Burn deep learning framework, and owns the session registry for
//! training, prediction, transfer learning, and checkpoint persistence.

mod checkpoint;
mod dataset;
mod error;
mod hyperparameters;
mod layers;
mod model;
mod runtime;
mod training;

pub use checkpoint::CheckpointMeta;
pub use dataset::{TrainSample, TrainSet};
pub use error::{RuntimeError, RuntimeResult};
pub use hyperparameters::{HyperparameterPatch, Hyperparameters, LossKind, OptimizerKind};
pub use layers::{ActivationFn, Layer, LayerSpec, default_architecture, validate_architecture};
pub use runtime::{
    LoadSource, ModelRuntime, PredictionOutput, SavedCheckpoint, SessionInfo, SessionState,
    TransferSpec,
};
pub use training::{TrainOptions, TrainOutput};
