//! Session error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::tokens::TokenError;

/// Errors that can occur while creating or validating sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Login rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Session missing, expired, or presented with the wrong CSRF token.
    #[error("unauthorized")]
    Unauthorized,

    /// Every generated session ID collided with an existing one.
    #[error("could not allocate a unique session id after {attempts} attempts")]
    TokenCollision {
        /// Number of IDs tried.
        attempts: u32,
    },

    /// The configured TTL cannot be added to the current time.
    #[error("session ttl out of range")]
    TtlOutOfRange,

    /// Token generation failed.
    #[error("token generation failed: {0}")]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
