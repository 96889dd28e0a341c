//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pennyshop_core::{Money, UserId, Username};

/// A storefront account (domain type).
///
/// Does not carry the password hash; see [`StoredCredentials`].
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Unique account name.
    pub username: Username,
    /// Current balance in minor units. Never negative.
    pub balance: Money,
    /// Last successful login or authorized request.
    pub last_login: DateTime<Utc>,
    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}

/// A user together with their stored password hash.
///
/// Only produced by the credential lookup used during login.
#[derive(Clone)]
pub struct StoredCredentials {
    /// The account.
    pub user: User,
    /// PHC-formatted Argon2 hash (embeds salt and cost parameters).
    pub password_hash: String,
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("user", &self.user)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}
