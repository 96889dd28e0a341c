//! Account commands: register and login.

use std::net::IpAddr;

use pennyshop_storefront::db::PgStore;
use pennyshop_storefront::error::AppError;
use pennyshop_storefront::state::AppState;

use crate::error::CliError;
use crate::output;

/// Create an account and print it.
///
/// # Errors
///
/// Returns `CliError::App` if registration fails.
pub async fn register(
    state: &AppState<PgStore>,
    username: &str,
    password: &str,
) -> Result<(), CliError> {
    let user = state
        .auth()
        .register(username, password)
        .await
        .map_err(AppError::from)?;

    output::emit(&user)?;
    Ok(())
}

/// Log in and print the new session, including its CSRF token.
///
/// # Errors
///
/// Returns `CliError::App` if the credentials are rejected or the session
/// cannot be created.
pub async fn login(
    state: &AppState<PgStore>,
    username: &str,
    password: &str,
    addr: Option<IpAddr>,
) -> Result<(), CliError> {
    let session = state
        .sessions()
        .login(username, password, addr)
        .await
        .map_err(AppError::from)?;

    output::emit(&serde_json::json!({
        "session": session.id.as_str(),
        "csrf": session.csrf_token.as_str(),
        "user_id": session.user_id,
        "expires_at": session.expires_at,
    }))?;
    Ok(())
}
