//! Repository functions for bearer tokens.
//!
//! Tokens are stored hashed; the opaque value never touches disk. Expired
//! tokens are removed lazily when they are next looked up.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RegistryResult;
use crate::models::AuthToken;
use crate::store::DocumentStore;

const COLLECTION: &str = "tokens";

/// Repository for token operations.
pub struct TokenRepository;

impl TokenRepository {
    /// Stores a new token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn insert(
        store: &DocumentStore,
        token_hash: String,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> RegistryResult<AuthToken> {
        let token = AuthToken {
            token_hash,
            user_id,
            expires_at,
            created_at: Utc::now(),
        };
        store.put(COLLECTION, &token.token_hash, &token).await?;
        Ok(token)
    }

    /// Looks up a token by hash, returning it only while unexpired.
    /// Expired records are deleted on sight.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn find_valid(
        store: &DocumentStore,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> RegistryResult<Option<AuthToken>> {
        let Some(token): Option<AuthToken> = store.get(COLLECTION, token_hash).await? else {
            return Ok(None);
        };

        if token.expires_at <= now {
            store.delete(COLLECTION, token_hash).await?;
            return Ok(None);
        }

        Ok(Some(token))
    }

    /// Removes a token record (logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn delete(store: &DocumentStore, token_hash: &str) -> RegistryResult<()> {
        store.delete(COLLECTION, token_hash).await
    }
}
