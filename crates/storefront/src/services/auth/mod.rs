//! Authentication service.
//!
//! Account registration and the credential store. Login lives in
//! [`crate::services::sessions`], because a successful login is the creation
//! of a session.

mod error;
pub mod password;

pub use error::AuthError;
pub use password::{CredentialHasher, validate_password};

use tracing::{info, instrument};

use pennyshop_core::Username;

use crate::db::{RepositoryError, UserStore};
use crate::models::User;

/// Authentication service.
///
/// Handles user registration.
pub struct AuthService<'a, S> {
    users: &'a S,
    hasher: &'a CredentialHasher,
}

impl<'a, S: UserStore> AuthService<'a, S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a S, hasher: &'a CredentialHasher) -> Self {
        Self { users, hasher }
    }

    /// Register a new user with username and password.
    ///
    /// The account starts with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` if the username format is invalid.
    /// Returns `AuthError::InvalidPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UsernameTaken` if the username is already registered.
    /// Returns `AuthError::PasswordHash` if hashing fails.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = Username::parse(username)?;
        validate_password(password)?;

        let password_hash = self.hasher.hash(password)?;

        let user = self
            .users
            .create_user(&username, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UsernameTaken,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::HashingConfig;
    use crate::db::MemoryStore;

    fn fast_hasher() -> CredentialHasher {
        CredentialHasher::new(&HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_starts_at_zero() {
        let store = MemoryStore::new();
        let hasher = fast_hasher();
        let auth = AuthService::new(&store, &hasher);

        let user = auth.register("test_user", "password123").await.unwrap();
        assert_eq!(user.username.as_str(), "test_user");
        assert_eq!(user.balance, pennyshop_core::Money::ZERO);
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let store = MemoryStore::new();
        let hasher = fast_hasher();
        let auth = AuthService::new(&store, &hasher);

        auth.register("test_user", "password123").await.unwrap();
        let result = auth.register("test_user", "different-password").await;
        assert_matches!(result, Err(AuthError::UsernameTaken));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let store = MemoryStore::new();
        let hasher = fast_hasher();
        let auth = AuthService::new(&store, &hasher);

        assert_matches!(
            auth.register("", "password123").await,
            Err(AuthError::InvalidUsername(_))
        );
        assert_matches!(
            auth.register("test_user", "short").await,
            Err(AuthError::InvalidPassword(_))
        );
    }

    #[tokio::test]
    async fn test_stored_hash_is_not_the_password() {
        let store = MemoryStore::new();
        let hasher = fast_hasher();
        let auth = AuthService::new(&store, &hasher);

        auth.register("test_user", "password123").await.unwrap();
        let creds = store
            .get_credentials(&Username::parse("test_user").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(creds.password_hash, "password123");
        assert!(hasher.verify("password123", &creds.password_hash));
    }
}
