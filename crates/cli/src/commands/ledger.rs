//! Ledger commands. All but `items` require a valid session and CSRF token.

use pennyshop_core::{CsrfToken, ItemId, Money, SessionId};
use pennyshop_storefront::db::PgStore;
use pennyshop_storefront::error::AppError;
use pennyshop_storefront::models::Principal;
use pennyshop_storefront::state::AppState;

use crate::SessionArgs;
use crate::error::CliError;
use crate::output;

async fn authorize(state: &AppState<PgStore>, auth: SessionArgs) -> Result<Principal, CliError> {
    let principal = state
        .sessions()
        .validate(&SessionId::new(auth.session), &CsrfToken::new(auth.csrf))
        .await
        .map_err(AppError::from)?;
    Ok(principal)
}

/// Print the caller's balance.
///
/// # Errors
///
/// Returns `CliError::App` if authorization or the lookup fails.
pub async fn balance(state: &AppState<PgStore>, auth: SessionArgs) -> Result<(), CliError> {
    let principal = authorize(state, auth).await?;
    let balance = state
        .ledger()
        .balance(principal.user_id)
        .await
        .map_err(AppError::from)?;

    output::emit(&serde_json::json!({
        "user_id": principal.user_id,
        "balance": balance,
    }))?;
    Ok(())
}

/// Deposit `amount` and print the new balance.
///
/// # Errors
///
/// Returns `CliError::App` if authorization fails or the amount is rejected.
pub async fn deposit(
    state: &AppState<PgStore>,
    auth: SessionArgs,
    amount: Money,
) -> Result<(), CliError> {
    let principal = authorize(state, auth).await?;
    let balance = state
        .ledger()
        .deposit(principal.user_id, amount)
        .await
        .map_err(AppError::from)?;

    output::emit(&serde_json::json!({
        "user_id": principal.user_id,
        "deposited": amount,
        "balance": balance,
    }))?;
    Ok(())
}

/// Buy one item and print the purchase record.
///
/// # Errors
///
/// Returns `CliError::App` if authorization fails or the purchase is rejected.
pub async fn purchase(
    state: &AppState<PgStore>,
    auth: SessionArgs,
    item: ItemId,
) -> Result<(), CliError> {
    let principal = authorize(state, auth).await?;
    let purchase = state
        .ledger()
        .purchase(principal.user_id, item)
        .await
        .map_err(AppError::from)?;

    output::emit(&purchase)?;
    Ok(())
}

/// Print the caller's purchase history, one purchase per line.
///
/// # Errors
///
/// Returns `CliError::App` if authorization or the lookup fails.
pub async fn purchases(state: &AppState<PgStore>, auth: SessionArgs) -> Result<(), CliError> {
    let principal = authorize(state, auth).await?;
    let history = state
        .ledger()
        .purchases(principal.user_id)
        .await
        .map_err(AppError::from)?;

    for entry in &history {
        output::emit(entry)?;
    }
    Ok(())
}

/// Print every item, one per line.
///
/// # Errors
///
/// Returns `CliError::App` if the lookup fails.
pub async fn items(state: &AppState<PgStore>) -> Result<(), CliError> {
    let items = state.ledger().items().await.map_err(AppError::from)?;

    for item in &items {
        output::emit(item)?;
    }
    Ok(())
}
