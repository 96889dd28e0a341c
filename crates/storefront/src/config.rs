//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `STOREFRONT_LOCK_TIMEOUT_MS` - Row lock wait per transaction (default: 5000)
//! - `STOREFRONT_TX_TIMEOUT_MS` - Upper bound on a ledger operation (default: 10000)
//! - `STOREFRONT_SESSION_TTL_SECS` - Session lifetime (default: 86400)
//! - `STOREFRONT_SESSION_SWEEP_INTERVAL_SECS` - Expired-session sweep period (default: 86400)
//! - `STOREFRONT_ARGON2_MEMORY_KIB` - Argon2 memory cost (default: 19456)
//! - `STOREFRONT_ARGON2_ITERATIONS` - Argon2 time cost (default: 2)
//! - `STOREFRONT_ARGON2_PARALLELISM` - Argon2 lanes (default: 1)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront core configuration.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Database connection settings
    pub database: DatabaseConfig,
    /// Session lifetime and sweep settings
    pub session: SessionConfig,
    /// Ledger transaction bounds
    pub ledger: LedgerConfig,
    /// Password hashing cost
    pub hashing: HashingConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub url: SecretString,
    /// Maximum pool connections
    pub max_connections: u32,
    /// How long a transaction waits for a row lock
    pub lock_timeout: Duration,
}

/// Session lifetime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time from login until a session expires
    pub ttl: Duration,
    /// Period of the background expired-session sweep
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Ledger transaction bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound on one ledger operation, including lock waits
    pub tx_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            tx_timeout: Duration::from_secs(10),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl ShopConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let session_defaults = SessionConfig::default();
        let hashing_defaults = HashingConfig::default();

        let database = DatabaseConfig {
            url: env.database_url("STOREFRONT_DATABASE_URL")?,
            max_connections: env.parse_or("STOREFRONT_DB_MAX_CONNECTIONS", 10)?,
            lock_timeout: env.millis_or("STOREFRONT_LOCK_TIMEOUT_MS", Duration::from_secs(5))?,
        };

        let session = SessionConfig {
            ttl: env.secs_or("STOREFRONT_SESSION_TTL_SECS", session_defaults.ttl)?,
            sweep_interval: env.secs_or(
                "STOREFRONT_SESSION_SWEEP_INTERVAL_SECS",
                session_defaults.sweep_interval,
            )?,
        };

        let ledger = LedgerConfig {
            tx_timeout: env.millis_or("STOREFRONT_TX_TIMEOUT_MS", LedgerConfig::default().tx_timeout)?,
        };

        let hashing = HashingConfig {
            memory_kib: env.parse_or("STOREFRONT_ARGON2_MEMORY_KIB", hashing_defaults.memory_kib)?,
            iterations: env.parse_or("STOREFRONT_ARGON2_ITERATIONS", hashing_defaults.iterations)?,
            parallelism: env.parse_or(
                "STOREFRONT_ARGON2_PARALLELISM",
                hashing_defaults.parallelism,
            )?,
        };

        Ok(Self {
            database,
            session,
            ledger,
            hashing,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Parse a positive number of seconds.
    fn secs_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let secs = positive(key, self.parse_or(key, default.as_secs())?)?;
        Ok(Duration::from_secs(secs))
    }

    /// Parse a positive number of milliseconds.
    ///
    /// Zero is rejected: `lock_timeout = 0` disables the wait bound in
    /// `PostgreSQL`.
    fn millis_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let default = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        let millis = positive(key, self.parse_or(key, default)?)?;
        Ok(Duration::from_millis(millis))
    }
}

fn positive(key: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}
