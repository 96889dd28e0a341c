//! Integration tests for the Pennyshop storefront core.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory store (no external services)
//! cargo test -p pennyshop-integration-tests
//!
//! # Against PostgreSQL
//! STOREFRONT_TEST_DATABASE_URL=postgres://localhost/pennyshop_test \
//!     cargo test -p pennyshop-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `auth_sessions` - Registration, login and session validation
//! - `ledger` - Deposits, purchases and concurrent spending
//! - `session_sweep` - Background removal of expired sessions
//! - `postgres` - The same flows against a real database (ignored by default)

use std::time::Duration;

use pennyshop_core::Money;
use pennyshop_storefront::config::{HashingConfig, LedgerConfig, SessionConfig};
use pennyshop_storefront::db::MemoryStore;
use pennyshop_storefront::error::AppError;
use pennyshop_storefront::models::{Item, Session};
use pennyshop_storefront::services::auth::CredentialHasher;
use pennyshop_storefront::services::tokens::TokenGenerator;
use pennyshop_storefront::state::AppState;

/// Password used for every seeded account.
pub const TEST_PASSWORD: &str = "password123";

/// Account seeded with a zero balance.
pub const TEST_USER: &str = "test_user";

/// Account seeded with [`RICH_BALANCE`].
pub const RICH_USER: &str = "rich_test_user";

/// Starting balance of [`RICH_USER`]: 20000.00.
pub const RICH_BALANCE: Money = Money::from_minor(2_000_000);

/// Price of the seeded item: 17500.00.
pub const GPU_PRICE: Money = Money::from_minor(1_750_000);

/// Argon2 cost low enough for tests.
pub const FAST_HASHING: HashingConfig = HashingConfig {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
};

/// A storefront over an in-memory store, seeded with two accounts and one
/// item.
pub struct TestShop {
    pub store: MemoryStore,
    pub state: AppState<MemoryStore>,
    pub item: Item,
}

impl TestShop {
    /// Build a shop with default session and ledger settings.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if seeding fails.
    pub async fn new() -> Result<Self, AppError> {
        Self::with_config(SessionConfig::default(), LedgerConfig::default()).await
    }

    /// Build a shop with the given session and ledger settings.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if seeding fails.
    pub async fn with_config(
        session: SessionConfig,
        ledger: LedgerConfig,
    ) -> Result<Self, AppError> {
        let store = MemoryStore::new();
        let hasher = CredentialHasher::new(&FAST_HASHING)?;
        let state = AppState::new(store.clone(), hasher, TokenGenerator::os(), session, ledger);

        state.auth().register(TEST_USER, TEST_PASSWORD).await?;
        let rich = state.auth().register(RICH_USER, TEST_PASSWORD).await?;
        state.ledger().deposit(rich.id, RICH_BALANCE).await?;

        let item = store
            .seed_item(
                "Nvidia RTX 3060 12GB",
                "Graphics card with 12GB of GDDR6 memory",
                GPU_PRICE,
            )
            .await?;

        Ok(Self { store, state, item })
    }

    /// Log `username` in with [`TEST_PASSWORD`].
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if login fails.
    pub async fn login(&self, username: &str) -> Result<Session, AppError> {
        Ok(self
            .state
            .sessions()
            .login(username, TEST_PASSWORD, None)
            .await?)
    }
}

/// Session settings with a short TTL and sweep period.
#[must_use]
pub const fn short_sessions(ttl: Duration, sweep_interval: Duration) -> SessionConfig {
    SessionConfig {
        ttl,
        sweep_interval,
    }
}
