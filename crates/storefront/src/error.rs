//! Unified error handling.
//!
//! Provides a unified `AppError` type over every service error and sorts
//! each one into an [`ErrorClass`], which is what a caller needs to decide
//! how to respond: reject the input, ask for credentials again, report a
//! business outcome, or fail opaquely and maybe retry.

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::ledger::LedgerError;
use crate::services::sessions::SessionError;
use crate::services::tokens::TokenError;

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input; nothing happened.
    Validation,
    /// Bad credentials or an unusable session. Never says which factor failed.
    Auth,
    /// A legitimate outcome the caller can act on; nothing was mutated.
    Business,
    /// Storage, entropy, hashing or timeout failure; the transaction was
    /// rolled back.
    Infrastructure,
}

/// Application-level error type for the storefront core.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Session operation failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Ledger operation failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Token generation failed.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Classify this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Auth(err) => auth_class(err),
            Self::Session(err) => match err {
                SessionError::Auth(inner) => auth_class(inner),
                SessionError::Unauthorized => ErrorClass::Auth,
                SessionError::TokenCollision { .. }
                | SessionError::TtlOutOfRange
                | SessionError::Token(_)
                | SessionError::Repository(_) => ErrorClass::Infrastructure,
            },
            Self::Ledger(err) => match err {
                LedgerError::InvalidAmount(_) => ErrorClass::Validation,
                LedgerError::UserNotFound
                | LedgerError::ItemNotFound
                | LedgerError::InsufficientFunds { .. } => ErrorClass::Business,
                LedgerError::Timeout | LedgerError::Repository(_) => ErrorClass::Infrastructure,
            },
            Self::Token(TokenError::InvalidLength) => ErrorClass::Validation,
            Self::Token(TokenError::Entropy(_)) | Self::Database(_) | Self::Config(_) => {
                ErrorClass::Infrastructure
            }
        }
    }

    /// Whether repeating the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(LedgerError::Timeout) => true,
            Self::Database(err)
            | Self::Auth(AuthError::Repository(err))
            | Self::Session(
                SessionError::Repository(err) | SessionError::Auth(AuthError::Repository(err)),
            )
            | Self::Ledger(LedgerError::Repository(err)) => err.is_retryable(),
            _ => false,
        }
    }

    /// Message safe to show the caller.
    ///
    /// Auth failures collapse to one generic message and infrastructure
    /// failures hide their cause.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.class() {
            ErrorClass::Auth => "Invalid credentials or session".to_string(),
            ErrorClass::Infrastructure => "Internal error".to_string(),
            ErrorClass::Validation | ErrorClass::Business => match self {
                Self::Auth(err) | Self::Session(SessionError::Auth(err)) => err.to_string(),
                Self::Ledger(err) => err.to_string(),
                _ => self.to_string(),
            },
        }
    }
}

const fn auth_class(err: &AuthError) -> ErrorClass {
    match err {
        AuthError::InvalidUsername(_) | AuthError::InvalidPassword(_) => ErrorClass::Validation,
        AuthError::InvalidCredentials => ErrorClass::Auth,
        AuthError::UsernameTaken => ErrorClass::Business,
        AuthError::HashingParams(_) | AuthError::PasswordHash | AuthError::Repository(_) => {
            ErrorClass::Infrastructure
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
