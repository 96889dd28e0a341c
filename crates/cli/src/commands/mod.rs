//! CLI command implementations.

pub mod account;
pub mod ledger;
pub mod migrate;
pub mod sessions;

use pennyshop_storefront::config::ShopConfig;
use pennyshop_storefront::db::{PgStore, RepositoryError, create_pool};
use pennyshop_storefront::error::AppError;
use pennyshop_storefront::state::AppState;

use crate::error::CliError;

/// Connect to the database and build the application state.
///
/// # Errors
///
/// Returns `CliError::App` if the pool cannot be created or the hashing
/// parameters are invalid.
pub async fn connect(config: &ShopConfig) -> Result<AppState<PgStore>, CliError> {
    let pool = create_pool(&config.database)
        .await
        .map_err(RepositoryError::from)?;
    tracing::debug!("Database pool created");

    let store = PgStore::new(pool, config.database.lock_timeout);
    AppState::from_config(store, config).map_err(|e| CliError::App(AppError::from(e)))
}
