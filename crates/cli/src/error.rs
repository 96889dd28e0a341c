//! CLI error type, exit codes and error reporting.

use std::process::ExitCode;

use thiserror::Error;

use pennyshop_storefront::config::ConfigError;
use pennyshop_storefront::db::RepositoryError;
use pennyshop_storefront::error::{AppError, ErrorClass};

/// Errors surfaced by a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// A storefront core operation failed.
    #[error(transparent)]
    App(#[from] AppError),

    /// Migrations could not be applied.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Output could not be written.
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    /// The background task ended abnormally.
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::App(AppError::from(err))
    }
}

impl From<RepositoryError> for CliError {
    fn from(err: RepositoryError) -> Self {
        Self::App(AppError::from(err))
    }
}

impl CliError {
    /// Error class driving the exit code.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::App(err) => err.class(),
            Self::Migrate(_) | Self::Output(_) | Self::Task(_) => ErrorClass::Infrastructure,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::App(err) => err.public_message(),
            other => other.to_string(),
        }
    }
}

/// Process exit code for an error class.
pub const fn exit_code(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::Validation => 2,
        ErrorClass::Auth => 3,
        ErrorClass::Business => 4,
        ErrorClass::Infrastructure => 5,
    }
}

const fn class_name(class: ErrorClass) -> &'static str {
    match class {
        ErrorClass::Validation => "validation",
        ErrorClass::Auth => "auth",
        ErrorClass::Business => "business",
        ErrorClass::Infrastructure => "infrastructure",
    }
}

/// Log the error, capture infrastructure failures to Sentry, write a JSON
/// error line to stderr and return the exit code.
pub fn report(err: &CliError) -> ExitCode {
    let class = err.class();

    if class == ErrorClass::Infrastructure {
        let event_id = sentry::capture_error(err);
        tracing::error!(error = %err, sentry_event_id = %event_id, "Command failed");
    } else {
        tracing::debug!(error = %err, "Command rejected");
    }

    let line = serde_json::json!({
        "error": err.public_message(),
        "class": class_name(class),
        "retryable": matches!(err, CliError::App(e) if e.is_retryable()),
    });
    // stderr may be closed; the exit code still carries the outcome
    let _ = crate::output::emit_to(std::io::stderr().lock(), &line);

    ExitCode::from(exit_code(class))
}
