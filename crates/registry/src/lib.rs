//! Model registry: persistent records for users, AI models, and datasets.
//!
//! Records live in a JSON document store backed by `object_store`
//! (a local directory in production, in-memory for tests). Repositories
//! expose the domain mutators; every mutator persists synchronously before
//! returning.

mod ai_models;
mod datasets;
mod error;
mod models;
mod store;
mod tokens;
mod users;

pub use ai_models::{ModelRepository, TrainingOutcome};
pub use datasets::{DatasetRepository, DatasetUpdate};
pub use error::{RegistryError, RegistryResult};
pub use models::{
    AIModel, AccessLevel, AuthToken, CloneOptions, CreateDataset, CreateModel, CreateUser,
    Dataset, DatasetFormat, DatasetMetadata, DatasetStatistics, DatasetVersion, Hyperparameters,
    LayerSpec, ModelStatus, ModelVersion, PredictionRecord, PreprocessingStep, SharedEntry,
    StorageInfo, TrainingDataRecord, TrainingHistory, User, UserProfile, UserRole, Visibility,
    Visualization,
};
pub use store::DocumentStore;
pub use tokens::TokenRepository;
pub use users::UserRepository;
