//! HTTP endpoint handlers.

pub mod auth;
pub mod datasets;
pub mod models;

use axum::response::IntoResponse;

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    "model hub is running"
}
