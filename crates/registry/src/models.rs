//! Domain record types persisted by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

/// Free-form profile fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// User account record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    #[serde(default)]
    pub profile: UserProfile,
    /// Arbitrary preference keys, shallow-merged on update.
    #[serde(default)]
    pub preferences: serde_json::Map<String, serde_json::Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user record.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Lifecycle status of an AI model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Initialized,
    Trained,
    Saved,
    Error,
}

/// One declarative layer descriptor: a type tag plus free-form config.
///
/// The runtime adapter validates these against its supported layer set;
/// the registry stores them verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(rename = "type")]
    pub layer_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Training configuration distinct from learned parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hyperparameters {
    pub optimizer: String,
    pub loss: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    pub learning_rate: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            optimizer: "adam".to_string(),
            loss: "binary_crossentropy".to_string(),
            metrics: vec!["accuracy".to_string()],
            learning_rate: 1e-3,
        }
    }
}

/// Summary of the most recent training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_trained_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub epochs: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_accuracy: Option<f64>,
}

/// Embedded record of one training submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingDataRecord {
    pub sample_count: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub created_at: DateTime<Utc>,
}

/// Embedded record of one prediction request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub confidence: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One saved version of a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub version_number: u32,
    pub storage_path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub performance: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Typed visualization blob attached to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub viz_type: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Neural-network model metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AIModel {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner: Uuid,
    pub model_type: String,
    pub status: ModelStatus,
    pub architecture: Vec<LayerSpec>,
    pub hyperparameters: Hyperparameters,
    #[serde(default)]
    pub training_history: TrainingHistory,
    #[serde(default)]
    pub training_data: Vec<TrainingDataRecord>,
    #[serde(default)]
    pub predictions: Vec<PredictionRecord>,
    #[serde(default)]
    pub versions: Vec<ModelVersion>,
    /// Strictly increases by one per added version; never reused.
    #[serde(default)]
    pub current_version: u32,
    #[serde(default)]
    pub visualizations: Vec<Visualization>,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a model record.
#[derive(Debug, Clone)]
pub struct CreateModel {
    pub name: String,
    pub description: String,
    pub owner: Uuid,
    pub model_type: String,
    pub architecture: Vec<LayerSpec>,
    pub hyperparameters: Hyperparameters,
}

/// Options accepted when cloning a model for transfer learning. Layer
/// freezing is a runtime concern and travels separately.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// On-disk format of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    Csv,
    Json,
    Parquet,
    Text,
    Images,
    Other,
}

impl Default for DatasetFormat {
    fn default() -> Self {
        Self::Csv
    }
}

/// Who can see a dataset besides its creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Public,
    Shared,
}

/// Access level granted through sharing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    View,
    Edit,
    Admin,
}

/// Sharing grant, keyed by user id. Last write wins on the level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedEntry {
    pub user: Uuid,
    pub access_level: AccessLevel,
}

/// Where the dataset's file lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub filename: String,
}

/// One preprocessing step, append-only in application order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessingStep {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub applied_at: DateTime<Utc>,
}

/// One dataset version. Filenames derive from the base name plus a
/// monotonically increasing `_v{n}` suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVersion {
    pub version_number: u32,
    pub filename: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Dataset statistics, replaced wholesale on write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStatistics {
    #[serde(default)]
    pub summary: serde_json::Value,
    #[serde(default)]
    pub distributions: serde_json::Value,
    #[serde(default)]
    pub correlations: serde_json::Value,
}

/// Structural metadata about the dataset contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<u64>>,
    #[serde(default)]
    pub data_types: serde_json::Value,
}

/// Dataset metadata record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub format: DatasetFormat,
    pub visibility: Visibility,
    #[serde(default)]
    pub tags: Vec<String>,
    pub creator: Uuid,
    #[serde(default)]
    pub storage_info: StorageInfo,
    #[serde(default)]
    pub shared_with: Vec<SharedEntry>,
    #[serde(default)]
    pub preprocessing: Vec<PreprocessingStep>,
    #[serde(default)]
    pub versions: Vec<DatasetVersion>,
    #[serde(default)]
    pub statistics: DatasetStatistics,
    #[serde(default)]
    pub metadata: DatasetMetadata,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dataset {
    /// Whether `user` may see this dataset.
    #[must_use]
    pub fn visible_to(&self, user: Uuid) -> bool {
        self.creator == user
            || self.visibility == Visibility::Public
            || self.shared_with.iter().any(|s| s.user == user)
    }

    /// Whether `user` may modify this dataset through sharing grants.
    #[must_use]
    pub fn shared_edit(&self, user: Uuid) -> bool {
        self.shared_with.iter().any(|s| {
            s.user == user && matches!(s.access_level, AccessLevel::Edit | AccessLevel::Admin)
        })
    }
}

/// Input for creating a dataset record.
#[derive(Debug, Clone)]
pub struct CreateDataset {
    pub name: String,
    pub description: String,
    pub format: DatasetFormat,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub creator: Uuid,
    pub storage_info: StorageInfo,
}

/// Bearer token record, keyed by the SHA-256 hash of the opaque token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
