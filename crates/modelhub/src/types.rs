//! Request and response types for the HTTP API.
//!
//! Every response follows the `{ success, message?, data?, error? }`
//! envelope; errors are produced by `ApiError` with the same shape.

use chrono::{DateTime, Utc};
use registry::{
    AccessLevel, DatasetFormat, LayerSpec, StorageInfo, User, UserProfile, UserRole, Visibility,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    #[must_use]
    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

/// User record with the credential hash stripped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub profile: UserProfile,
    pub preferences: serde_json::Map<String, serde_json::Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            profile: user.profile,
            preferences: user.preferences,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

// ---- auth ----

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub user: UserPublic,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub is_active: bool,
}

// ---- models ----

/// Optional hyperparameter fields accepted on initialize and update.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HyperparametersBody {
    pub optimizer: Option<String>,
    pub loss: Option<String>,
    pub metrics: Option<Vec<String>>,
    pub learning_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model_type: Option<String>,
    pub architecture: Option<Vec<LayerSpec>>,
    pub hyperparameters: Option<HyperparametersBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    pub model_id: Uuid,
    #[serde(default)]
    pub train_data: Vec<Vec<f32>>,
    #[serde(default)]
    pub labels: Vec<Vec<f32>>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub validation_split: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub model_id: Uuid,
    #[serde(default)]
    pub input_data: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictData {
    pub predictions: Vec<Vec<f32>>,
    pub confidence: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub model_id: Uuid,
    pub save_path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveData {
    pub path: String,
    pub model: registry::AIModel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneRequest {
    pub model_id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub freeze_base_layers: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneData {
    pub model: registry::AIModel,
    pub freeze_base_layers: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureRequest {
    pub model_id: Uuid,
    #[serde(default)]
    pub architecture: Vec<LayerSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HyperparametersRequest {
    pub model_id: Uuid,
    #[serde(flatten)]
    pub patch: HyperparametersBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationRequest {
    pub model_id: Uuid,
    #[serde(default, alias = "type")]
    pub viz_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRequest {
    pub model_id: Uuid,
    #[serde(default, alias = "path")]
    pub storage_path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub performance: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub model_id: Uuid,
    pub is_public: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModelsQuery {
    pub user_id: Option<Uuid>,
}

// ---- datasets ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatasetRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub format: Option<DatasetFormat>,
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub storage_info: Option<StorageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDatasetRequest {
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub user_id: Uuid,
    pub access_level: AccessLevel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessingRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVersionRequest {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsRequest {
    #[serde(default)]
    pub summary: serde_json::Value,
    #[serde(default)]
    pub distributions: serde_json::Value,
    #[serde(default)]
    pub correlations: serde_json::Value,
}
