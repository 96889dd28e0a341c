//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Observable lifecycle state of a session.
///
/// A session is `Created` only between token generation and the insert
/// committing, so callers only ever see `Active` or `Expired`. There is no
/// revoked state: sessions end by expiry alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Within its lifetime; accepted by validation.
    Active,
    /// Past its expiry; treated as absent even while the row still exists.
    Expired,
}

impl SessionState {
    /// Whether a session in this state may authorize requests.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Expired => write!(f, "expired"),
        }
    }
}
