//! Business logic services for the storefront core.
//!
//! # Services
//!
//! - `auth` - Registration and the Argon2id credential store
//! - `tokens` - Opaque session IDs and CSRF tokens
//! - `sessions` - Login, request authorization and session expiry
//! - `ledger` - Balances, deposits and purchases
//!
//! Services borrow their store and configuration; obtain them from
//! [`crate::state::AppState`].

pub mod auth;
pub mod ledger;
pub mod sessions;
pub mod tokens;
