//! AI model endpoints: lifecycle, training, inference, and metadata.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use ml_runtime::{HyperparameterPatch, LoadSource, RuntimeError, TrainOptions, TransferSpec};
use registry::{
    AIModel, CloneOptions, CreateModel, ModelRepository, ModelStatus, PredictionRecord,
    TrainingOutcome,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{
    ApiResponse, ArchitectureRequest, CloneData, CloneRequest, HyperparametersBody,
    HyperparametersRequest, InitializeRequest, ListModelsQuery, PredictData, PredictRequest,
    SaveData, SaveRequest, TrainRequest, VersionRequest, VisibilityRequest, VisualizationRequest,
};

const DEFAULT_EPOCHS: usize = 10;
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_VALIDATION_SPLIT: f64 = 0.2;

/// POST /api/ai/initialize
///
/// Creates the registry record and brings up a live session. With no
/// architecture supplied the fixed default network is used.
pub async fn initialize(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<InitializeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AIModel>>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("model name is required".to_string()));
    }

    let hyperparameters = hyperparameters_from_body(body.hyperparameters);
    let runtime_hp = to_runtime_hyperparameters(&hyperparameters)?;

    let (record_specs, source) = match body.architecture {
        Some(specs) if !specs.is_empty() => {
            let runtime_specs = to_runtime_specs(&specs);
            ml_runtime::validate_architecture(&runtime_specs)?;
            (specs, LoadSource::Architecture(runtime_specs))
        }
        _ => (
            from_runtime_specs(ml_runtime::default_architecture()),
            LoadSource::Default,
        ),
    };

    let model = ModelRepository::create(
        state.store(),
        CreateModel {
            name: body.name.trim().to_string(),
            description: body.description,
            owner: caller.id,
            model_type: body
                .model_type
                .unwrap_or_else(|| "neural-network".to_string()),
            architecture: record_specs,
            hyperparameters,
        },
    )
    .await?;

    state
        .runtime()
        .initialize(model.id, source, Some(runtime_hp))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("model initialized", model)),
    ))
}

/// POST /api/ai/train
pub async fn train(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<TrainRequest>,
) -> Result<Json<ApiResponse<AIModel>>, ApiError> {
    if body.train_data.is_empty() || body.labels.is_empty() {
        return Err(ApiError::Validation(
            "trainData and labels are required".to_string(),
        ));
    }

    let model = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    ensure_mutable(&model, &caller)?;

    let options = TrainOptions {
        epochs: body.epochs.unwrap_or(DEFAULT_EPOCHS),
        batch_size: body.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        validation_split: body.validation_split.unwrap_or(DEFAULT_VALIDATION_SPLIT),
    };

    let output = match state
        .runtime()
        .train(body.model_id, &body.train_data, &body.labels, &options)
    {
        Ok(output) => output,
        Err(err @ RuntimeError::NoModel(_)) => return Err(err.into()),
        Err(err) => {
            mark_error(&state, body.model_id).await;
            return Err(err.into());
        }
    };

    let updated = ModelRepository::record_training(
        state.store(),
        body.model_id,
        TrainingOutcome {
            sample_count: body.train_data.len(),
            epochs: output.epochs_completed,
            batch_size: options.batch_size,
            final_loss: f64::from(output.final_loss),
            final_accuracy: f64::from(output.final_accuracy),
        },
    )
    .await?;

    Ok(Json(ApiResponse::with_message("training complete", updated)))
}

/// POST /api/ai/predict
pub async fn predict(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<PredictRequest>,
) -> Result<Json<ApiResponse<PredictData>>, ApiError> {
    if body.input_data.is_empty() {
        return Err(ApiError::Validation("inputData is required".to_string()));
    }

    let model = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    ensure_readable(&model, &caller)?;

    let output = match state.runtime().predict(body.model_id, &body.input_data) {
        Ok(output) => output,
        Err(err @ RuntimeError::NoModel(_)) => return Err(err.into()),
        Err(err) => {
            mark_error(&state, body.model_id).await;
            return Err(err.into());
        }
    };

    ModelRepository::record_prediction(
        state.store(),
        body.model_id,
        PredictionRecord {
            input: serde_json::to_value(&body.input_data)?,
            output: serde_json::to_value(&output.predictions)?,
            confidence: output.confidence.iter().copied().map(f64::from).collect(),
            requested_by: Some(caller.id),
            created_at: Utc::now(),
        },
    )
    .await?;

    Ok(Json(ApiResponse::ok(PredictData {
        predictions: output.predictions,
        confidence: output.confidence,
    })))
}

/// POST /api/ai/save
pub async fn save(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<SaveRequest>,
) -> Result<Json<ApiResponse<SaveData>>, ApiError> {
    let model = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    ensure_mutable(&model, &caller)?;

    let saved = state
        .runtime()
        .save(body.model_id, body.save_path.as_deref())?;

    let updated =
        ModelRepository::set_status(state.store(), body.model_id, ModelStatus::Saved).await?;

    Ok(Json(ApiResponse::with_message(
        "model saved",
        SaveData {
            path: saved.path.display().to_string(),
            model: updated,
        },
    )))
}

/// POST /api/ai/clone
///
/// Requires the source to be owned by the caller or public. Base layers
/// are frozen by default.
pub async fn clone_model(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<CloneRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CloneData>>), ApiError> {
    let freeze_base_layers = body.freeze_base_layers.unwrap_or(true);

    let clone = ModelRepository::clone_model(
        state.store(),
        body.model_id,
        caller.id,
        CloneOptions {
            name: body.name,
            description: body.description,
        },
    )
    .await?;

    // When the source has a saved checkpoint, bring up a live
    // transfer-learning session right away. A source that was never saved
    // still clones; its session starts on a later initialize.
    let source = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    if let Some(version) = source.versions.last() {
        let spec = TransferSpec {
            base_path: version.storage_path.clone(),
            freeze_base_layers,
            output_layer_indices: None,
        };
        if let Err(err) = state
            .runtime()
            .initialize(clone.id, LoadSource::Transfer(spec), None)
        {
            warn!(model_id = %clone.id, error = %err, "transfer session setup failed");
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "model cloned",
            CloneData {
                model: clone,
                freeze_base_layers,
            },
        )),
    ))
}

/// PUT /api/ai/architecture
pub async fn update_architecture(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<ArchitectureRequest>,
) -> Result<Json<ApiResponse<AIModel>>, ApiError> {
    if body.architecture.is_empty() {
        return Err(ApiError::Validation("architecture is required".to_string()));
    }

    let model = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    ensure_mutable(&model, &caller)?;

    let runtime_specs = to_runtime_specs(&body.architecture);
    ml_runtime::validate_architecture(&runtime_specs)?;

    let updated =
        ModelRepository::update_architecture(state.store(), body.model_id, body.architecture)
            .await?;

    // Keep a live session consistent with the stored descriptor.
    if state.runtime().has_session(body.model_id) {
        let hp = to_runtime_hyperparameters(&updated.hyperparameters)?;
        state.runtime().initialize(
            body.model_id,
            LoadSource::Architecture(runtime_specs),
            Some(hp),
        )?;
    }

    Ok(Json(ApiResponse::with_message("architecture updated", updated)))
}

/// PUT /api/ai/hyperparameters
pub async fn update_hyperparameters(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<HyperparametersRequest>,
) -> Result<Json<ApiResponse<AIModel>>, ApiError> {
    let model = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    ensure_mutable(&model, &caller)?;

    let patch = to_runtime_patch(&body.patch)?;

    let updated = ModelRepository::merge_hyperparameters(
        state.store(),
        body.model_id,
        body.patch.optimizer,
        body.patch.loss,
        body.patch.metrics,
        body.patch.learning_rate,
    )
    .await?;

    if state.runtime().has_session(body.model_id) {
        state.runtime().update_hyperparameters(body.model_id, &patch)?;
    }

    Ok(Json(ApiResponse::with_message(
        "hyperparameters updated",
        updated,
    )))
}

/// POST /api/ai/visualization
pub async fn add_visualization(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<VisualizationRequest>,
) -> Result<Json<ApiResponse<AIModel>>, ApiError> {
    if body.viz_type.trim().is_empty() {
        return Err(ApiError::Validation("vizType is required".to_string()));
    }

    let model = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    ensure_mutable(&model, &caller)?;

    let updated = ModelRepository::add_visualization(
        state.store(),
        body.model_id,
        body.viz_type,
        body.data,
    )
    .await?;

    Ok(Json(ApiResponse::with_message("visualization added", updated)))
}

/// POST /api/ai/version
pub async fn add_version(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<VersionRequest>,
) -> Result<Json<ApiResponse<AIModel>>, ApiError> {
    if body.storage_path.trim().is_empty() {
        return Err(ApiError::Validation("storagePath is required".to_string()));
    }

    let model = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    ensure_mutable(&model, &caller)?;

    let updated = ModelRepository::add_version(
        state.store(),
        body.model_id,
        body.storage_path,
        body.description,
        body.performance,
    )
    .await?;

    Ok(Json(ApiResponse::with_message("version added", updated)))
}

/// PUT /api/ai/visibility
pub async fn set_visibility(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<VisibilityRequest>,
) -> Result<Json<ApiResponse<AIModel>>, ApiError> {
    let model = ModelRepository::find_by_id(state.store(), body.model_id).await?;
    ensure_mutable(&model, &caller)?;

    let updated =
        ModelRepository::set_visibility(state.store(), body.model_id, body.is_public).await?;
    Ok(Json(ApiResponse::with_message("visibility updated", updated)))
}

/// GET /api/ai/models[?userId=...]
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ListModelsQuery>,
) -> Result<Json<ApiResponse<Vec<AIModel>>>, ApiError> {
    let models = match query.user_id {
        Some(owner) => ModelRepository::list_by_owner(state.store(), owner).await?,
        None => ModelRepository::list(state.store()).await?,
    };
    Ok(Json(ApiResponse::ok(models)))
}

/// GET /api/ai/models/{id}
pub async fn get_model(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<AIModel>>, ApiError> {
    let model = ModelRepository::find_by_id(state.store(), id).await?;
    ensure_readable(&model, &caller)?;
    Ok(Json(ApiResponse::ok(model)))
}

/// GET /api/ai/public-models
pub async fn list_public_models(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AIModel>>>, ApiError> {
    let models = ModelRepository::list_public(state.store()).await?;
    Ok(Json(ApiResponse::ok(models)))
}

fn ensure_mutable(model: &AIModel, caller: &AuthUser) -> Result<(), ApiError> {
    if model.owner == caller.id || caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Permission(
            "only the owner may modify this model".to_string(),
        ))
    }
}

fn ensure_readable(model: &AIModel, caller: &AuthUser) -> Result<(), ApiError> {
    if model.owner == caller.id || model.is_public || caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Permission("this model is private".to_string()))
    }
}

/// Training and prediction failures are surfaced on the record so later
/// reads see the condition.
async fn mark_error(state: &AppState, id: Uuid) {
    if let Err(err) = ModelRepository::set_status(state.store(), id, ModelStatus::Error).await {
        warn!(model_id = %id, error = %err, "failed to record error status");
    }
}

fn hyperparameters_from_body(body: Option<HyperparametersBody>) -> registry::Hyperparameters {
    let mut hp = registry::Hyperparameters::default();
    let Some(body) = body else {
        return hp;
    };
    if let Some(optimizer) = body.optimizer {
        hp.optimizer = optimizer;
    }
    if let Some(loss) = body.loss {
        hp.loss = loss;
    }
    if let Some(metrics) = body.metrics {
        hp.metrics = metrics;
    }
    if let Some(learning_rate) = body.learning_rate {
        hp.learning_rate = learning_rate;
    }
    hp
}

fn to_runtime_specs(specs: &[registry::LayerSpec]) -> Vec<ml_runtime::LayerSpec> {
    specs
        .iter()
        .map(|spec| ml_runtime::LayerSpec {
            layer_type: spec.layer_type.clone(),
            config: spec.config.clone(),
        })
        .collect()
}

fn from_runtime_specs(specs: Vec<ml_runtime::LayerSpec>) -> Vec<registry::LayerSpec> {
    specs
        .into_iter()
        .map(|spec| registry::LayerSpec {
            layer_type: spec.layer_type,
            config: spec.config,
        })
        .collect()
}

fn to_runtime_hyperparameters(
    hp: &registry::Hyperparameters,
) -> Result<ml_runtime::Hyperparameters, ApiError> {
    ml_runtime::Hyperparameters::from_strings(
        &hp.optimizer,
        &hp.loss,
        hp.metrics.clone(),
        hp.learning_rate,
    )
    .map_err(Into::into)
}

/// Validates patch fields eagerly so nothing is merged on a bad name.
fn to_runtime_patch(body: &HyperparametersBody) -> Result<HyperparameterPatch, ApiError> {
    if let Some(optimizer) = &body.optimizer {
        ml_runtime::OptimizerKind::parse(optimizer)?;
    }
    if let Some(loss) = &body.loss {
        ml_runtime::LossKind::parse(loss)?;
    }
    if let Some(learning_rate) = body.learning_rate {
        if learning_rate <= 0.0 || !learning_rate.is_finite() {
            return Err(ApiError::Validation(format!(
                "learning rate {learning_rate} must be positive"
            )));
        }
    }

    Ok(HyperparameterPatch {
        optimizer: body.optimizer.clone(),
        loss: body.loss.clone(),
        metrics: body.metrics.clone(),
        learning_rate: body.learning_rate,
    })
}
