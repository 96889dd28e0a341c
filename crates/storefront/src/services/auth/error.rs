//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] pennyshop_core::UsernameError),

    /// Password rejected by the registration policy.
    #[error("password validation failed: {0}")]
    InvalidPassword(String),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Username already registered.
    #[error("username already taken")]
    UsernameTaken,

    /// Argon2 cost parameters are out of range.
    #[error("invalid password hashing parameters: {0}")]
    HashingParams(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
