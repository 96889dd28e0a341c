//! Session manager.
//!
//! A session moves from created (inside `login`, never observable) to
//! active, and becomes expired once `now > expires_at`. There is no logout:
//! expired rows are ignored on lookup and later removed in bulk by
//! [`SessionManager::sweep_expired`].
//!
//! Every authorized request presents both the session ID and the CSRF token
//! issued with it. A successful [`SessionManager::validate`] yields a
//! [`Principal`] that the caller passes on to the ledger.

mod error;

pub use error::SessionError;

use std::net::IpAddr;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, instrument, warn};

use pennyshop_core::{CsrfToken, SessionId, SessionState, UserId, Username};

use crate::config::SessionConfig;
use crate::db::{RepositoryError, SessionStore, UserStore};
use crate::models::{NewSession, Principal, Session};
use crate::services::auth::{AuthError, CredentialHasher};
use crate::services::tokens::{EntropySource, OsEntropy, TokenGenerator};

/// Upper bound on session ID draws per login.
pub const MAX_SESSION_ID_ATTEMPTS: u32 = 5;

/// Session lifecycle service.
pub struct SessionManager<'a, S, E = OsEntropy> {
    store: &'a S,
    hasher: &'a CredentialHasher,
    tokens: &'a TokenGenerator<E>,
    config: &'a SessionConfig,
}

impl<'a, S, E> SessionManager<'a, S, E>
where
    S: UserStore + SessionStore,
    E: EntropySource,
{
    /// Create a new session manager.
    #[must_use]
    pub const fn new(
        store: &'a S,
        hasher: &'a CredentialHasher,
        tokens: &'a TokenGenerator<E>,
        config: &'a SessionConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            config,
        }
    }

    /// Authenticate a user and open a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Auth(AuthError::InvalidCredentials)` if the
    /// username is unknown or the password is wrong; the two cases are not
    /// distinguished.
    /// Returns `SessionError::TokenCollision` if no unique session ID could be
    /// drawn within [`MAX_SESSION_ID_ATTEMPTS`].
    /// Returns `SessionError::Token` or `SessionError::Repository` on
    /// infrastructure failure.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        source_addr: Option<IpAddr>,
    ) -> Result<Session, SessionError> {
        let Ok(username) = Username::parse(username) else {
            self.hasher.verify_dummy(password);
            return Err(AuthError::InvalidCredentials.into());
        };

        let Some(credentials) = self.store.get_credentials(&username).await? else {
            self.hasher.verify_dummy(password);
            debug!("login for unknown username");
            return Err(AuthError::InvalidCredentials.into());
        };

        if !self.hasher.verify(password, &credentials.password_hash) {
            debug!(user_id = %credentials.user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }

        let user_id = credentials.user.id;
        let now = Utc::now();
        let expires_at = expiry_after(now, self.config)?;
        let csrf_token = self.tokens.csrf_token()?;

        let session = self
            .insert_unique(NewSession {
                id: SessionId::new(String::new()),
                csrf_token,
                user_id,
                source_addr,
                expires_at,
            })
            .await?;

        self.touch_last_login(user_id, now).await;

        info!(user_id = %user_id, expires_at = %session.expires_at, "session created");
        Ok(session)
    }

    /// Insert `template` under a freshly drawn ID, redrawing on collision.
    async fn insert_unique(&self, template: NewSession) -> Result<Session, SessionError> {
        for attempt in 1..=MAX_SESSION_ID_ATTEMPTS {
            let id = self.tokens.session_id()?;

            if self.store.get_session(&id).await?.is_some() {
                warn!(attempt, "session id collision, regenerating");
                continue;
            }

            let new = NewSession {
                id,
                ..template.clone()
            };
            match self.store.insert_session(new).await {
                Ok(session) => return Ok(session),
                Err(RepositoryError::Conflict(_)) => {
                    warn!(attempt, "session id collision on insert, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SessionError::TokenCollision {
            attempts: MAX_SESSION_ID_ATTEMPTS,
        })
    }

    /// Authorize a request carrying a session ID and CSRF token.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Unauthorized` if the session is missing or
    /// expired, or the CSRF token does not match.
    /// Returns `SessionError::Repository` on storage failure.
    pub async fn validate(
        &self,
        session_id: &SessionId,
        csrf_token: &CsrfToken,
    ) -> Result<Principal, SessionError> {
        self.validate_at(session_id, csrf_token, Utc::now()).await
    }

    /// [`SessionManager::validate`] evaluated at an explicit instant.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::validate`].
    #[instrument(skip_all)]
    pub async fn validate_at(
        &self,
        session_id: &SessionId,
        csrf_token: &CsrfToken,
        now: DateTime<Utc>,
    ) -> Result<Principal, SessionError> {
        if session_id.is_empty() || csrf_token.is_empty() {
            return Err(SessionError::Unauthorized);
        }

        let Some(session) = self.store.get_session(session_id).await? else {
            debug!("unknown session");
            return Err(SessionError::Unauthorized);
        };

        if session.state_at(now) == SessionState::Expired {
            debug!(user_id = %session.user_id, "expired session");
            return Err(SessionError::Unauthorized);
        }

        // Exact comparison; see DESIGN.md on timing.
        if session.csrf_token != *csrf_token {
            warn!(user_id = %session.user_id, "csrf token mismatch");
            return Err(SessionError::Unauthorized);
        }

        self.touch_last_login(session.user_id, now).await;

        Ok(Principal {
            user_id: session.user_id,
            session_expires_at: session.expires_at,
        })
    }

    /// Delete every session that expired before `now`.
    ///
    /// Returns the number of sessions removed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Repository` if the delete fails.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let removed = self.store.delete_expired_sessions(now).await?;
        info!(removed, "expired sessions swept");
        Ok(removed)
    }

    /// Best-effort `last_login` refresh. Failures are logged, not returned.
    async fn touch_last_login(&self, user_id: UserId, now: DateTime<Utc>) {
        if let Err(e) = self.store.touch_last_login(user_id, now).await {
            warn!(user_id = %user_id, error = %e, "failed to update last_login");
        }
    }
}

fn expiry_after(now: DateTime<Utc>, config: &SessionConfig) -> Result<DateTime<Utc>, SessionError> {
    TimeDelta::from_std(config.ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or(SessionError::TtlOutOfRange)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::config::HashingConfig;
    use crate::db::MemoryStore;
    use crate::services::auth::AuthService;
    use crate::services::tokens::TokenError;

    /// Replays a fixed sequence of fill bytes, then repeats the last one.
    struct ScriptedEntropy(Mutex<Vec<u8>>);

    impl ScriptedEntropy {
        fn new(mut script: Vec<u8>) -> Self {
            script.reverse();
            Self(Mutex::new(script))
        }
    }

    impl EntropySource for ScriptedEntropy {
        fn fill(&self, dest: &mut [u8]) -> Result<(), TokenError> {
            let mut script = self.0.lock().unwrap();
            let byte = if script.len() > 1 {
                script.pop().unwrap()
            } else {
                script[0]
            };
            dest.fill(byte);
            Ok(())
        }
    }

    struct Fixture {
        store: MemoryStore,
        hasher: CredentialHasher,
        config: SessionConfig,
    }

    impl Fixture {
        async fn new() -> Self {
            let fixture = Self {
                store: MemoryStore::new(),
                hasher: CredentialHasher::new(&HashingConfig {
                    memory_kib: 1024,
                    iterations: 1,
                    parallelism: 1,
                })
                .unwrap(),
                config: SessionConfig {
                    ttl: Duration::from_secs(60),
                    sweep_interval: Duration::from_secs(60),
                },
            };
            AuthService::new(&fixture.store, &fixture.hasher)
                .register("test_user", "password123")
                .await
                .unwrap();
            fixture
        }

        fn manager<'a, E: EntropySource>(
            &'a self,
            tokens: &'a TokenGenerator<E>,
        ) -> SessionManager<'a, MemoryStore, E> {
            SessionManager::new(&self.store, &self.hasher, tokens, &self.config)
        }
    }

    #[tokio::test]
    async fn test_login_then_validate() {
        let fx = Fixture::new().await;
        let tokens = TokenGenerator::os();
        let sessions = fx.manager(&tokens);

        let session = sessions
            .login("test_user", "password123", Some("127.0.0.1".parse().unwrap()))
            .await
            .unwrap();
        assert_ne!(session.id.as_str(), session.csrf_token.as_str());

        let principal = sessions
            .validate(&session.id, &session.csrf_token)
            .await
            .unwrap();
        assert_eq!(principal.user_id, session.user_id);
        assert_eq!(principal.session_expires_at, session.expires_at);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_indistinguishable() {
        let fx = Fixture::new().await;
        let tokens = TokenGenerator::os();
        let sessions = fx.manager(&tokens);

        let wrong_password = sessions.login("test_user", "wrong-password", None).await;
        let unknown_user = sessions.login("nobody", "password123", None).await;
        let malformed = sessions.login("two words", "password123", None).await;

        for result in [wrong_password, unknown_user, malformed] {
            assert_matches!(
                result,
                Err(SessionError::Auth(AuthError::InvalidCredentials))
            );
        }
        assert_eq!(fx.store.session_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_csrf_mismatch_rejected() {
        let fx = Fixture::new().await;
        let tokens = TokenGenerator::os();
        let sessions = fx.manager(&tokens);
        let session = sessions.login("test_user", "password123", None).await.unwrap();

        for csrf in ["", "wrong", session.id.as_str()] {
            let result = sessions
                .validate(&session.id, &CsrfToken::from(csrf))
                .await;
            assert_matches!(result, Err(SessionError::Unauthorized));
        }
    }

    #[tokio::test]
    async fn test_expired_session_rejected_before_sweep() {
        let fx = Fixture::new().await;
        let tokens = TokenGenerator::os();
        let sessions = fx.manager(&tokens);
        let session = sessions.login("test_user", "password123", None).await.unwrap();

        let at_expiry = session.expires_at;
        let after_expiry = at_expiry + TimeDelta::seconds(1);

        assert!(
            sessions
                .validate_at(&session.id, &session.csrf_token, at_expiry)
                .await
                .is_ok()
        );
        assert_matches!(
            sessions
                .validate_at(&session.id, &session.csrf_token, after_expiry)
                .await,
            Err(SessionError::Unauthorized)
        );
        assert_eq!(fx.store.session_count().await.unwrap(), 1);

        assert_eq!(sessions.sweep_expired(after_expiry).await.unwrap(), 1);
        assert_eq!(fx.store.session_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_collision_is_retried() {
        let fx = Fixture::new().await;
        // Fills: csrf, first session id, csrf, colliding session id, fresh id.
        let tokens = TokenGenerator::with_source(ScriptedEntropy::new(vec![9, 1, 9, 1, 2]));
        let sessions = fx.manager(&tokens);

        let first = sessions.login("test_user", "password123", None).await.unwrap();
        let second = sessions.login("test_user", "password123", None).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(fx.store.session_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_collision_retries_are_bounded() {
        let fx = Fixture::new().await;
        let tokens = TokenGenerator::with_source(ScriptedEntropy::new(vec![7]));
        let sessions = fx.manager(&tokens);

        sessions.login("test_user", "password123", None).await.unwrap();
        let result = sessions.login("test_user", "password123", None).await;
        assert_matches!(
            result,
            Err(SessionError::TokenCollision {
                attempts: MAX_SESSION_ID_ATTEMPTS
            })
        );
    }

    #[tokio::test]
    async fn test_last_login_failure_does_not_abort_login() {
        let fx = Fixture::new().await;
        let tokens = TokenGenerator::os();
        let sessions = fx.manager(&tokens);
        fx.store.fail_last_login_updates(true);

        let session = sessions.login("test_user", "password123", None).await.unwrap();
        assert!(
            sessions
                .validate(&session.id, &session.csrf_token)
                .await
                .is_ok()
        );
    }
}
