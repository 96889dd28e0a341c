//! Session-related types.
//!
//! A session binds a bearer session ID and a separate CSRF token to one
//! user. The session ID travels in an HTTP-only cookie; the CSRF token must
//! be readable by the caller's script and echoed back in a header, so a
//! forged cross-site request carrying only the cookie is rejected.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use pennyshop_core::{CsrfToken, SessionId, SessionState, UserId};

/// A persisted login session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Opaque, unique bearer credential.
    pub id: SessionId,
    /// Opaque token the caller must present alongside the session ID.
    pub csrf_token: CsrfToken,
    /// Owning user.
    pub user_id: UserId,
    /// Network address the login came from, if known.
    pub source_addr: Option<IpAddr>,
    /// Instant after which the session no longer authorizes anything.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Lifecycle state at `now`.
    ///
    /// A session is still active at exactly `expires_at`; it expires
    /// strictly after.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if now > self.expires_at {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }
}

/// Values for a session about to be inserted.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: SessionId,
    pub csrf_token: CsrfToken,
    pub user_id: UserId,
    pub source_addr: Option<IpAddr>,
    pub expires_at: DateTime<Utc>,
}

impl From<NewSession> for Session {
    fn from(new: NewSession) -> Self {
        Self {
            id: new.id,
            csrf_token: new.csrf_token,
            user_id: new.user_id,
            source_addr: new.source_addr,
            expires_at: new.expires_at,
        }
    }
}

/// The authenticated principal produced by session validation.
///
/// Passed explicitly to whatever acts on the caller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// The user the session belongs to.
    pub user_id: UserId,
    /// When the authorizing session expires.
    pub session_expires_at: DateTime<Utc>,
}
