//! Application state shared across callers.

use std::sync::Arc;

use crate::config::{LedgerConfig, SessionConfig, ShopConfig};
use crate::db::Store;
use crate::services::auth::{AuthError, AuthService, CredentialHasher};
use crate::services::ledger::Ledger;
use crate::services::sessions::SessionManager;
use crate::services::tokens::{EntropySource, OsEntropy, TokenGenerator};

/// Application state shared across all callers and background tasks.
///
/// This struct is cheaply cloneable via `Arc` and hands out the services,
/// each borrowing the shared store, hasher and configuration.
pub struct AppState<S, E = OsEntropy> {
    inner: Arc<AppStateInner<S, E>>,
}

impl<S, E> Clone for AppState<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<S, E> {
    store: S,
    hasher: CredentialHasher,
    tokens: TokenGenerator<E>,
    session: SessionConfig,
    ledger: LedgerConfig,
}

impl<S: Store> AppState<S, OsEntropy> {
    /// Create application state from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::HashingParams` if the hashing cost is invalid.
    pub fn from_config(store: S, config: &ShopConfig) -> Result<Self, AuthError> {
        let hasher = CredentialHasher::new(&config.hashing)?;
        Ok(Self::new(
            store,
            hasher,
            TokenGenerator::os(),
            config.session,
            config.ledger,
        ))
    }
}

impl<S: Store, E: EntropySource> AppState<S, E> {
    /// Create application state from its parts.
    #[must_use]
    pub fn new(
        store: S,
        hasher: CredentialHasher,
        tokens: TokenGenerator<E>,
        session: SessionConfig,
        ledger: LedgerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store,
                hasher,
                tokens,
                session,
                ledger,
            }),
        }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Get the session configuration.
    #[must_use]
    pub fn session_config(&self) -> &SessionConfig {
        &self.inner.session
    }

    /// Registration and account lookup.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_, S> {
        AuthService::new(&self.inner.store, &self.inner.hasher)
    }

    /// Login, request authorization and session expiry.
    #[must_use]
    pub fn sessions(&self) -> SessionManager<'_, S, E> {
        SessionManager::new(
            &self.inner.store,
            &self.inner.hasher,
            &self.inner.tokens,
            &self.inner.session,
        )
    }

    /// Balances, deposits and purchases.
    #[must_use]
    pub fn ledger(&self) -> Ledger<'_, S> {
        Ledger::new(&self.inner.store, &self.inner.ledger)
    }
}
