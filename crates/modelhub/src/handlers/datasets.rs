//! Dataset endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use registry::{
    CreateDataset, Dataset, DatasetMetadata, DatasetRepository, DatasetStatistics, DatasetUpdate,
    Visibility,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{
    ApiResponse, CreateDatasetRequest, DatasetVersionRequest, PreprocessingRequest, ShareRequest,
    StatisticsRequest, UpdateDatasetRequest,
};

/// POST /api/datasets
pub async fn create(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<CreateDatasetRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Dataset>>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("dataset name is required".to_string()));
    }

    let dataset = DatasetRepository::create(
        state.store(),
        CreateDataset {
            name: body.name.trim().to_string(),
            description: body.description,
            format: body.format.unwrap_or_default(),
            visibility: body.visibility.unwrap_or(Visibility::Private),
            tags: body.tags,
            creator: caller.id,
            storage_info: body.storage_info.unwrap_or_default(),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("dataset created", dataset)),
    ))
}

/// GET /api/datasets
pub async fn list(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<Dataset>>>, ApiError> {
    let datasets = DatasetRepository::list_visible_to(state.store(), caller.id).await?;
    Ok(Json(ApiResponse::ok(datasets)))
}

/// GET /api/datasets/{id}
pub async fn get(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Dataset>>, ApiError> {
    let dataset = find_active(&state, id).await?;
    ensure_readable(&dataset, &caller)?;
    Ok(Json(ApiResponse::ok(dataset)))
}

/// PUT /api/datasets/{id}
pub async fn update(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDatasetRequest>,
) -> Result<Json<ApiResponse<Dataset>>, ApiError> {
    let dataset = find_active(&state, id).await?;
    ensure_editable(&dataset, &caller)?;

    let updated = DatasetRepository::update(
        state.store(),
        id,
        DatasetUpdate {
            description: body.description,
            visibility: body.visibility,
            tags: body.tags,
        },
    )
    .await?;

    Ok(Json(ApiResponse::with_message("dataset updated", updated)))
}

/// DELETE /api/datasets/{id} (soft delete)
pub async fn remove(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Dataset>>, ApiError> {
    let dataset = find_active(&state, id).await?;
    ensure_owned(&dataset, &caller)?;

    let deleted = DatasetRepository::soft_delete(state.store(), id).await?;
    Ok(Json(ApiResponse::with_message("dataset deleted", deleted)))
}

/// POST /api/datasets/{id}/share
pub async fn share(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<ShareRequest>,
) -> Result<Json<ApiResponse<Dataset>>, ApiError> {
    let dataset = find_active(&state, id).await?;
    ensure_owned(&dataset, &caller)?;

    if body.user_id == dataset.creator {
        return Err(ApiError::Validation(
            "cannot share a dataset with its creator".to_string(),
        ));
    }

    let updated =
        DatasetRepository::share_with(state.store(), id, body.user_id, body.access_level).await?;
    Ok(Json(ApiResponse::with_message("dataset shared", updated)))
}

/// POST /api/datasets/{id}/preprocessing
pub async fn add_preprocessing(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<PreprocessingRequest>,
) -> Result<Json<ApiResponse<Dataset>>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation(
            "preprocessing step name is required".to_string(),
        ));
    }

    let dataset = find_active(&state, id).await?;
    ensure_editable(&dataset, &caller)?;

    let updated = DatasetRepository::add_preprocessing_step(
        state.store(),
        id,
        body.name,
        body.description,
        body.parameters,
    )
    .await?;

    Ok(Json(ApiResponse::with_message("preprocessing step added", updated)))
}

/// POST /api/datasets/{id}/versions
pub async fn add_version(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<DatasetVersionRequest>,
) -> Result<Json<ApiResponse<Dataset>>, ApiError> {
    let dataset = find_active(&state, id).await?;
    ensure_editable(&dataset, &caller)?;

    let updated = DatasetRepository::add_version(state.store(), id, body.description).await?;
    Ok(Json(ApiResponse::with_message("version added", updated)))
}

/// PUT /api/datasets/{id}/statistics
pub async fn update_statistics(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatisticsRequest>,
) -> Result<Json<ApiResponse<Dataset>>, ApiError> {
    let dataset = find_active(&state, id).await?;
    ensure_editable(&dataset, &caller)?;

    let updated = DatasetRepository::replace_statistics(
        state.store(),
        id,
        DatasetStatistics {
            summary: body.summary,
            distributions: body.distributions,
            correlations: body.correlations,
        },
    )
    .await?;

    Ok(Json(ApiResponse::with_message("statistics updated", updated)))
}

/// PUT /api/datasets/{id}/metadata
pub async fn update_metadata(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<DatasetMetadata>,
) -> Result<Json<ApiResponse<Dataset>>, ApiError> {
    let dataset = find_active(&state, id).await?;
    ensure_editable(&dataset, &caller)?;

    let updated = DatasetRepository::update_metadata(state.store(), id, body).await?;
    Ok(Json(ApiResponse::with_message("metadata updated", updated)))
}

/// Soft-deleted datasets read as gone.
async fn find_active(state: &AppState, id: Uuid) -> Result<Dataset, ApiError> {
    let dataset = DatasetRepository::find_by_id(state.store(), id).await?;
    if dataset.is_active {
        Ok(dataset)
    } else {
        Err(ApiError::NotFound(format!("dataset {id}")))
    }
}

fn ensure_readable(dataset: &Dataset, caller: &AuthUser) -> Result<(), ApiError> {
    if dataset.visible_to(caller.id) || caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Permission("this dataset is private".to_string()))
    }
}

fn ensure_editable(dataset: &Dataset, caller: &AuthUser) -> Result<(), ApiError> {
    if dataset.creator == caller.id || caller.is_admin() || dataset.shared_edit(caller.id) {
        Ok(())
    } else {
        Err(ApiError::Permission(
            "edit access to this dataset is required".to_string(),
        ))
    }
}

fn ensure_owned(dataset: &Dataset, caller: &AuthUser) -> Result<(), ApiError> {
    if dataset.creator == caller.id || caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Permission(
            "only the creator may do this".to_string(),
        ))
    }
}
