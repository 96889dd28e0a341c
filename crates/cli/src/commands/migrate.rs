//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! pshop migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`

use sqlx::PgPool;

use crate::error::CliError;
use crate::output;

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns `CliError::Migrate` if a migration fails.
pub async fn run(pool: &PgPool) -> Result<(), CliError> {
    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(pool).await?;
    tracing::info!("Storefront migrations complete");

    output::emit(&serde_json::json!({ "migrated": true }))?;
    Ok(())
}
