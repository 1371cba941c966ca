//! API router.

use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all endpoints.
///
/// Registration, login, the public model listings, and the health probe
/// are open; everything else requires a bearer token.
pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(handlers::health))
        .route("/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/ai/models", get(handlers::models::list_models))
        .route("/api/ai/public-models", get(handlers::models::list_public_models));

    let protected = Router::new()
        // Account
        .route(
            "/api/auth/profile",
            get(handlers::auth::get_profile).put(handlers::auth::update_profile),
        )
        .route("/api/auth/preferences", put(handlers::auth::update_preferences))
        .route("/api/auth/change-password", put(handlers::auth::change_password))
        .route("/api/auth/users", get(handlers::auth::list_users))
        .route("/api/auth/users/{id}/role", put(handlers::auth::set_role))
        .route("/api/auth/users/{id}/status", put(handlers::auth::set_status))
        // AI models
        .route("/api/ai/initialize", post(handlers::models::initialize))
        .route("/api/ai/train", post(handlers::models::train))
        .route("/api/ai/predict", post(handlers::models::predict))
        .route("/api/ai/save", post(handlers::models::save))
        .route("/api/ai/clone", post(handlers::models::clone_model))
        .route("/api/ai/architecture", put(handlers::models::update_architecture))
        .route(
            "/api/ai/hyperparameters",
            put(handlers::models::update_hyperparameters),
        )
        .route("/api/ai/visualization", post(handlers::models::add_visualization))
        .route("/api/ai/version", post(handlers::models::add_version))
        .route("/api/ai/visibility", put(handlers::models::set_visibility))
        .route("/api/ai/models/{id}", get(handlers::models::get_model))
        // Datasets
        .route(
            "/api/datasets",
            post(handlers::datasets::create).get(handlers::datasets::list),
        )
        .route(
            "/api/datasets/{id}",
            get(handlers::datasets::get)
                .put(handlers::datasets::update)
                .delete(handlers::datasets::remove),
        )
        .route("/api/datasets/{id}/share", post(handlers::datasets::share))
        .route(
            "/api/datasets/{id}/preprocessing",
            post(handlers::datasets::add_preprocessing),
        )
        .route("/api/datasets/{id}/versions", post(handlers::datasets::add_version))
        .route(
            "/api/datasets/{id}/statistics",
            put(handlers::datasets::update_statistics),
        )
        .route(
            "/api/datasets/{id}/metadata",
            put(handlers::datasets::update_metadata),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
