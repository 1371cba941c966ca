//! Bearer-token authentication: password hashing, token issuance, and the
//! request middleware.
//!
//! Tokens are opaque random strings; only their SHA-256 hash is persisted.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use registry::{TokenRepository, UserRepository, UserRole};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, attached to the request by the middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Hashes a password into a PHC string.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Verifies a password against a stored PHC string.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Generates a fresh opaque bearer token.
#[must_use]
pub fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Hash under which a token is stored and looked up.
#[must_use]
pub fn token_hash(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Issues a token for `user_id` and persists its hash with the configured
/// TTL.
///
/// # Errors
///
/// Returns an error if the token record cannot be stored.
pub async fn issue_token(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let token = generate_token();
    let expires_at = Utc::now() + Duration::hours(state.config().token_ttl_hours);
    TokenRepository::insert(state.store(), token_hash(&token), user_id, expires_at).await?;
    Ok(token)
}

/// Middleware: verifies the bearer token and attaches [`AuthUser`] to the
/// request extensions.
///
/// # Errors
///
/// Returns [`ApiError::Auth`] for missing, malformed, expired, or revoked
/// credentials, and for deactivated accounts.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Auth("missing bearer token".to_string()))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Auth("malformed authorization header".to_string()))?;

    let record = TokenRepository::find_valid(state.store(), &token_hash(token), Utc::now())
        .await?
        .ok_or_else(|| ApiError::Auth("invalid or expired token".to_string()))?;

    let user = UserRepository::find_by_id(state.store(), record.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::Auth("account is deactivated".to_string()))?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        role: user.role,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_verify_roundtrip() {
        let hash = hash_password("hunter2").expect("hash");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_verify_against_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_tokens_are_unique_and_hash_stable() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(token_hash(&a), token_hash(&a));
        assert_ne!(token_hash(&a), token_hash(&b));
    }
}
