//! Authentication and account endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use registry::{CreateUser, UserProfile, UserRepository, UserRole};
use uuid::Uuid;

use crate::auth::{self, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{
    ApiResponse, ChangePasswordRequest, LoginData, LoginRequest, ProfileUpdateRequest,
    RegisterRequest, RoleUpdateRequest, StatusUpdateRequest, UserPublic,
};

/// POST /api/auth/register
///
/// The first account ever registered becomes an admin.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserPublic>>), ApiError> {
    if body.username.trim().is_empty() || body.email.trim().is_empty() || body.password.is_empty()
    {
        return Err(ApiError::Validation(
            "username, email, and password are required".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&body.password)?;
    let user = UserRepository::create(
        state.store(),
        CreateUser {
            username: body.username.trim().to_string(),
            email: body.email.trim().to_string(),
            password_hash,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("user registered", user.into())),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginData>>, ApiError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let user = UserRepository::find_by_login(state.store(), body.username.trim())
        .await?
        .ok_or_else(|| ApiError::Auth("invalid credentials".to_string()))?;

    if !user.is_active {
        return Err(ApiError::Auth("account is deactivated".to_string()));
    }
    if !auth::verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::Auth("invalid credentials".to_string()));
    }

    let token = auth::issue_token(&state, user.id).await?;

    Ok(Json(ApiResponse::ok(LoginData {
        token,
        user: user.into(),
    })))
}

/// GET /api/auth/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    let user = UserRepository::find_by_id(state.store(), caller.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<ProfileUpdateRequest>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    let user = UserRepository::update_profile(
        state.store(),
        caller.id,
        UserProfile {
            display_name: body.display_name,
            bio: body.bio,
            avatar_url: body.avatar_url,
        },
    )
    .await?;
    Ok(Json(ApiResponse::with_message("profile updated", user.into())))
}

/// PUT /api/auth/preferences
///
/// Shallow merge: incoming keys win, others are preserved.
pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    let user = UserRepository::update_preferences(state.store(), caller.id, body).await?;
    Ok(Json(ApiResponse::with_message("preferences updated", user.into())))
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    if body.current_password.is_empty() || body.new_password.is_empty() {
        return Err(ApiError::Validation(
            "current and new passwords are required".to_string(),
        ));
    }

    let user = UserRepository::find_by_id(state.store(), caller.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    if !auth::verify_password(&body.current_password, &user.password_hash) {
        return Err(ApiError::Validation(
            "current password is incorrect".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&body.new_password)?;
    let user = UserRepository::set_password_hash(state.store(), caller.id, password_hash).await?;
    Ok(Json(ApiResponse::with_message("password changed", user.into())))
}

/// GET /api/auth/users (admin only)
pub async fn list_users(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<UserPublic>>>, ApiError> {
    ensure_admin(&caller)?;
    let users = UserRepository::list(state.store()).await?;
    Ok(Json(ApiResponse::ok(
        users.into_iter().map(UserPublic::from).collect(),
    )))
}

/// PUT /api/auth/users/{id}/role (admin only)
pub async fn set_role(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleUpdateRequest>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    ensure_admin(&caller)?;

    let role = match body.role.to_lowercase().as_str() {
        "admin" => UserRole::Admin,
        "user" => UserRole::User,
        other => {
            return Err(ApiError::Validation(format!("unknown role: {other}")));
        }
    };

    let user = UserRepository::set_role(state.store(), id, role).await?;
    Ok(Json(ApiResponse::with_message("role updated", user.into())))
}

/// PUT /api/auth/users/{id}/status (admin only)
pub async fn set_status(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<ApiResponse<UserPublic>>, ApiError> {
    ensure_admin(&caller)?;
    let user = UserRepository::set_active(state.store(), id, body.is_active).await?;
    Ok(Json(ApiResponse::with_message("status updated", user.into())))
}

fn ensure_admin(caller: &AuthUser) -> Result<(), ApiError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Permission("admin role required".to_string()))
    }
}
