//! Storage layer for the storefront core.
//!
//! # Database: `storefront` schema in `PostgreSQL`
//!
//! ## Tables
//!
//! - `user` - Accounts, password hashes and balances
//! - `item` - Purchasable items (reference data, managed elsewhere)
//! - `session` - Login sessions with their CSRF tokens
//! - `purchase` - Append-only purchase ledger
//!
//! # Storage contract
//!
//! Services are generic over the traits in this module rather than over a
//! concrete pool, so the same session and ledger logic runs against
//! [`PgStore`] in production and [`MemoryStore`] in tests:
//!
//! - [`UserStore`] - unique account creation and lookup
//! - [`ItemStore`] - item lookup
//! - [`SessionStore`] - session lookup, insert and bulk expiry delete
//! - [`LedgerStore`] / [`LedgerTx`] - locked reads and writes of balances and
//!   prices inside an atomic transaction; dropping an uncommitted
//!   transaction rolls it back
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p pennyshop-cli -- migrate
//! ```

pub mod items;
pub mod ledger;
pub mod memory;
pub mod sessions;
pub mod users;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use pennyshop_core::{ItemId, Money, SessionId, UserId, Username};

use crate::config::DatabaseConfig;
use crate::models::{Item, NewSession, Purchase, Session, StoredCredentials, User, UserPurchase};

pub use ledger::PgLedgerTx;
pub use memory::MemoryStore;

/// SQLSTATE codes that mean "gave up waiting", not "the data is wrong".
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";
const QUERY_CANCELED: &str = "57014";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// A lock or connection could not be acquired in time, or a deadlock
    /// was broken by the database. Safe to retry.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backing store is unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique username).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether the failed operation can be retried unchanged.
    ///
    /// Only lock/pool timeouts and transport failures qualify; constraint
    /// violations and other statement errors fail the same way again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::Unavailable(_)
                | Self::Database(
                    sqlx::Error::Io(_) | sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed
                )
        )
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => Self::Timeout("connection pool exhausted".to_owned()),
            sqlx::Error::PoolClosed => Self::Unavailable("connection pool closed".to_owned()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(LOCK_NOT_AVAILABLE | DEADLOCK_DETECTED | QUERY_CANCELED) => {
                    Self::Timeout(db_err.message().to_owned())
                }
                _ => Self::Database(err),
            },
            _ => Self::Database(err),
        }
    }
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::from(err)
}

// =============================================================================
// Storage traits
// =============================================================================

/// Account persistence.
pub trait UserStore: Send + Sync {
    /// Insert a new account with a zero balance.
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    fn create_user(
        &self,
        username: &Username,
        password_hash: &str,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Look up an account and its password hash by username.
    fn get_credentials(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<Option<StoredCredentials>, RepositoryError>> + Send;

    /// Look up an account by ID.
    fn get_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Set `last_login`. Returns `RepositoryError::NotFound` for unknown users.
    fn touch_last_login(
        &self,
        id: UserId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Read access to item reference data.
pub trait ItemStore: Send + Sync {
    /// Look up an item by ID.
    fn get_item(
        &self,
        id: ItemId,
    ) -> impl Future<Output = Result<Option<Item>, RepositoryError>> + Send;

    /// All items, ordered by ID.
    fn list_items(&self) -> impl Future<Output = Result<Vec<Item>, RepositoryError>> + Send;
}

/// Session persistence.
pub trait SessionStore: Send + Sync {
    /// Look up a session row, expired or not.
    fn get_session(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Insert a session.
    ///
    /// Returns `RepositoryError::Conflict` if the session ID already exists.
    fn insert_session(
        &self,
        session: NewSession,
    ) -> impl Future<Output = Result<Session, RepositoryError>> + Send;

    /// Delete every session with `expires_at < now` in one statement.
    fn delete_expired_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Transactional access to balances, prices and the purchase ledger.
pub trait LedgerStore: Send + Sync {
    /// Transaction handle. Dropping it without [`LedgerTx::commit`] rolls
    /// back every staged write.
    type Tx: LedgerTx;

    /// Open a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;

    /// Read a balance outside any transaction.
    fn balance(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Money>, RepositoryError>> + Send;

    /// Purchase history for a user, oldest first.
    fn purchases(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<UserPurchase>, RepositoryError>> + Send;
}

/// An open ledger transaction.
///
/// The `lock_*` reads take row locks held until commit or rollback, so the
/// values they return stay current for the rest of the transaction.
pub trait LedgerTx: Send {
    /// Lock an item row and read its price.
    fn lock_item_price(
        &mut self,
        item_id: ItemId,
    ) -> impl Future<Output = Result<Option<Money>, RepositoryError>> + Send;

    /// Lock a user row and read its balance.
    fn lock_balance(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Money>, RepositoryError>> + Send;

    /// Overwrite a balance previously read with [`LedgerTx::lock_balance`].
    fn set_balance(
        &mut self,
        user_id: UserId,
        balance: Money,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Append a purchase record.
    fn insert_purchase(
        &mut self,
        user_id: UserId,
        item_id: ItemId,
        price_paid: Money,
    ) -> impl Future<Output = Result<Purchase, RepositoryError>> + Send;

    /// Make every staged write visible atomically.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Everything the services need from one backing store.
pub trait Store: UserStore + ItemStore + SessionStore + LedgerStore {}

impl<T> Store for T where T: UserStore + ItemStore + SessionStore + LedgerStore {}

// =============================================================================
// PostgreSQL
// =============================================================================

/// `PostgreSQL`-backed store implementing every storage trait.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(config.url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RepositoryError::Timeout("lock".to_owned()).is_retryable());
        assert!(RepositoryError::Unavailable("down".to_owned()).is_retryable());
        assert!(!RepositoryError::NotFound.is_retryable());
        assert!(!RepositoryError::Conflict("dup".to_owned()).is_retryable());
        assert!(!RepositoryError::DataCorruption("bad".to_owned()).is_retryable());
    }

    #[test]
    fn test_only_transport_database_errors_are_retryable() {
        let io = RepositoryError::from(sqlx::Error::Io(std::io::Error::other("reset")));
        assert!(io.is_retryable());

        let protocol = RepositoryError::from(sqlx::Error::Protocol("bad frame".to_owned()));
        assert!(protocol.is_retryable());

        let statement = RepositoryError::from(sqlx::Error::RowNotFound);
        assert!(matches!(statement, RepositoryError::Database(_)));
        assert!(!statement.is_retryable());

        let decode = RepositoryError::from(sqlx::Error::ColumnNotFound("balance".to_owned()));
        assert!(!decode.is_retryable());
    }

    #[test]
    fn test_pool_timeout_maps_to_timeout() {
        let err = RepositoryError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, RepositoryError::Timeout(_)));
    }
}
