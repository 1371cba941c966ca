//! Repository functions for user accounts.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::models::{CreateUser, User, UserProfile, UserRole};
use crate::store::DocumentStore;

const COLLECTION: &str = "users";

/// Repository for user operations. Users are never hard-deleted;
/// deactivation flips `is_active`.
pub struct UserRepository;

impl UserRepository {
    /// Creates a new user record.
    ///
    /// The first account ever created is promoted to `admin`; every later
    /// account defaults to `user`. Usernames and emails must be unique
    /// across all accounts.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] when the username or email
    /// is already taken, or an error if the storage operation fails.
    pub async fn create(store: &DocumentStore, input: CreateUser) -> RegistryResult<User> {
        let _guard = store.write_guard().await;

        let existing: Vec<User> = store.list(COLLECTION).await?;
        if existing
            .iter()
            .any(|u| u.username == input.username || u.email == input.email)
        {
            return Err(RegistryError::DuplicateName(input.username));
        }

        let role = if existing.is_empty() {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email: input.email,
            password_hash: input.password_hash,
            role,
            profile: UserProfile::default(),
            preferences: serde_json::Map::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        store.put(COLLECTION, &user.id.to_string(), &user).await?;
        Ok(user)
    }

    /// Finds a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn find_by_id(store: &DocumentStore, id: Uuid) -> RegistryResult<Option<User>> {
        store.get(COLLECTION, &id.to_string()).await
    }

    /// Finds a user by username or email.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn find_by_login(
        store: &DocumentStore,
        login: &str,
    ) -> RegistryResult<Option<User>> {
        let users: Vec<User> = store.list(COLLECTION).await?;
        Ok(users
            .into_iter()
            .find(|u| u.username == login || u.email == login))
    }

    /// Lists every user account.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn list(store: &DocumentStore) -> RegistryResult<Vec<User>> {
        store.list(COLLECTION).await
    }

    /// Updates profile fields. `None` fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the user does not exist.
    pub async fn update_profile(
        store: &DocumentStore,
        id: Uuid,
        profile: UserProfile,
    ) -> RegistryResult<User> {
        store
            .update::<User, _>(COLLECTION, &id.to_string(), |user| {
                if let Some(name) = profile.display_name {
                    user.profile.display_name = Some(name);
                }
                if let Some(bio) = profile.bio {
                    user.profile.bio = Some(bio);
                }
                if let Some(url) = profile.avatar_url {
                    user.profile.avatar_url = Some(url);
                }
                user.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Shallow-merges preference keys; incoming keys win on conflict.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the user does not exist.
    pub async fn update_preferences(
        store: &DocumentStore,
        id: Uuid,
        patch: serde_json::Map<String, serde_json::Value>,
    ) -> RegistryResult<User> {
        store
            .update::<User, _>(COLLECTION, &id.to_string(), |user| {
                for (key, value) in patch {
                    user.preferences.insert(key, value);
                }
                user.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Replaces the stored credential hash.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the user does not exist.
    pub async fn set_password_hash(
        store: &DocumentStore,
        id: Uuid,
        password_hash: String,
    ) -> RegistryResult<User> {
        store
            .update::<User, _>(COLLECTION, &id.to_string(), |user| {
                user.password_hash = password_hash;
                user.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Sets the account role.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the user does not exist.
    pub async fn set_role(store: &DocumentStore, id: Uuid, role: UserRole) -> RegistryResult<User> {
        store
            .update::<User, _>(COLLECTION, &id.to_string(), |user| {
                user.role = role;
                user.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    /// Activates or deactivates the account.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the user does not exist.
    pub async fn set_active(
        store: &DocumentStore,
        id: Uuid,
        is_active: bool,
    ) -> RegistryResult<User> {
        store
            .update::<User, _>(COLLECTION, &id.to_string(), |user| {
                user.is_active = is_active;
                user.updated_at = Utc::now();
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(username: &str) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let store = DocumentStore::in_memory();

        let first = UserRepository::create(&store, input("alice")).await.expect("create");
        assert_eq!(first.role, UserRole::Admin);

        let second = UserRepository::create(&store, input("bob")).await.expect("create");
        assert_eq!(second.role, UserRole::User);

        let third = UserRepository::create(&store, input("carol")).await.expect("create");
        assert_eq!(third.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = DocumentStore::in_memory();

        UserRepository::create(&store, input("alice")).await.expect("create");
        let result = UserRepository::create(&store, input("alice")).await;
        assert!(matches!(result, Err(RegistryError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn test_preferences_shallow_merge() {
        let store = DocumentStore::in_memory();
        let user = UserRepository::create(&store, input("alice")).await.expect("create");

        let mut first = serde_json::Map::new();
        first.insert("theme".to_string(), serde_json::json!("dark"));
        first.insert("pageSize".to_string(), serde_json::json!(20));
        UserRepository::update_preferences(&store, user.id, first)
            .await
            .expect("update");

        let mut second = serde_json::Map::new();
        second.insert("theme".to_string(), serde_json::json!("light"));
        let updated = UserRepository::update_preferences(&store, user.id, second)
            .await
            .expect("update");

        assert_eq!(updated.preferences["theme"], serde_json::json!("light"));
        assert_eq!(updated.preferences["pageSize"], serde_json::json!(20));
    }

    #[tokio::test]
    async fn test_find_by_login_matches_email() {
        let store = DocumentStore::in_memory();
        UserRepository::create(&store, input("alice")).await.expect("create");

        let by_email = UserRepository::find_by_login(&store, "alice@example.com")
            .await
            .expect("find");
        assert!(by_email.is_some());

        let missing = UserRepository::find_by_login(&store, "nobody")
            .await
            .expect("find");
        assert!(missing.is_none());
    }
}
