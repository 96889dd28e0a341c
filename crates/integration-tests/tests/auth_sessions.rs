//! Integration tests for registration, login and session validation.

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use chrono::TimeDelta;

use pennyshop_core::{CsrfToken, SessionId};
use pennyshop_integration_tests::{RICH_USER, TEST_PASSWORD, TEST_USER, TestShop};
use pennyshop_storefront::error::{AppError, ErrorClass};
use pennyshop_storefront::services::auth::AuthError;
use pennyshop_storefront::services::sessions::SessionError;

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_starts_with_zero_balance() {
    let shop = TestShop::new().await.unwrap();

    let user = shop.state.auth().register("new_user", "hunter2hunter2").await.unwrap();
    assert_eq!(user.username.as_str(), "new_user");
    assert!(!user.balance.is_positive());

    let balance = shop.state.ledger().balance(user.id).await.unwrap();
    assert_eq!(balance, user.balance);
}

#[tokio::test]
async fn test_register_rejects_taken_username() {
    let shop = TestShop::new().await.unwrap();

    let result = shop.state.auth().register(TEST_USER, "another-password").await;
    assert_matches!(result, Err(AuthError::UsernameTaken));
}

#[tokio::test]
async fn test_register_validates_input() {
    let shop = TestShop::new().await.unwrap();

    assert_matches!(
        shop.state.auth().register("", TEST_PASSWORD).await,
        Err(AuthError::InvalidUsername(_))
    );
    assert_matches!(
        shop.state.auth().register("short_pw", "1234567").await,
        Err(AuthError::InvalidPassword(_))
    );
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_issues_distinct_tokens() {
    let shop = TestShop::new().await.unwrap();

    let session = shop.login(TEST_USER).await.unwrap();
    assert!(!session.id.is_empty());
    assert!(!session.csrf_token.is_empty());
    assert_ne!(session.id.as_str(), session.csrf_token.as_str());

    let again = shop.login(TEST_USER).await.unwrap();
    assert_ne!(session.id, again.id);
    assert_eq!(shop.store.session_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let shop = TestShop::new().await.unwrap();
    let sessions = shop.state.sessions();

    let wrong_password = sessions.login(TEST_USER, "wrong-password", None).await;
    let unknown_user = sessions.login("nobody", TEST_PASSWORD, None).await;

    let wrong_password = AppError::from(wrong_password.unwrap_err());
    let unknown_user = AppError::from(unknown_user.unwrap_err());

    assert_eq!(wrong_password.class(), ErrorClass::Auth);
    assert_eq!(unknown_user.class(), ErrorClass::Auth);
    assert_eq!(wrong_password.public_message(), unknown_user.public_message());
    assert_eq!(shop.store.session_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_login_records_source_address() {
    let shop = TestShop::new().await.unwrap();
    let addr = "203.0.113.7".parse().unwrap();

    let session = shop
        .state
        .sessions()
        .login(RICH_USER, TEST_PASSWORD, Some(addr))
        .await
        .unwrap();

    assert_eq!(session.source_addr, Some(addr));
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_validate_returns_principal() {
    let shop = TestShop::new().await.unwrap();
    let session = shop.login(RICH_USER).await.unwrap();

    let principal = shop
        .state
        .sessions()
        .validate(&session.id, &session.csrf_token)
        .await
        .unwrap();

    assert_eq!(principal.user_id, session.user_id);
    assert_eq!(principal.session_expires_at, session.expires_at);
}

#[tokio::test]
async fn test_validate_rejects_bad_tokens() {
    let shop = TestShop::new().await.unwrap();
    let session = shop.login(TEST_USER).await.unwrap();
    let sessions = shop.state.sessions();

    let wrong_csrf = sessions
        .validate(&session.id, &CsrfToken::from("forged"))
        .await;
    assert_matches!(wrong_csrf, Err(SessionError::Unauthorized));

    let unknown = sessions
        .validate(&SessionId::from("no-such-session"), &session.csrf_token)
        .await;
    assert_matches!(unknown, Err(SessionError::Unauthorized));

    let empty = sessions
        .validate(&SessionId::from(""), &CsrfToken::from(""))
        .await;
    assert_matches!(empty, Err(SessionError::Unauthorized));
}

#[tokio::test]
async fn test_csrf_token_is_bound_to_its_session() {
    let shop = TestShop::new().await.unwrap();
    let mine = shop.login(TEST_USER).await.unwrap();
    let theirs = shop.login(RICH_USER).await.unwrap();

    let result = shop
        .state
        .sessions()
        .validate(&mine.id, &theirs.csrf_token)
        .await;
    assert_matches!(result, Err(SessionError::Unauthorized));
}

#[tokio::test]
async fn test_session_valid_until_expiry() {
    let shop = TestShop::new().await.unwrap();
    let session = shop.login(TEST_USER).await.unwrap();
    let sessions = shop.state.sessions();

    let at_expiry = sessions
        .validate_at(&session.id, &session.csrf_token, session.expires_at)
        .await;
    assert!(at_expiry.is_ok());

    let after_expiry = sessions
        .validate_at(
            &session.id,
            &session.csrf_token,
            session.expires_at + TimeDelta::seconds(1),
        )
        .await;
    assert_matches!(after_expiry, Err(SessionError::Unauthorized));
}
