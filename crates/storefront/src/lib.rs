//! Pennyshop storefront core.
//!
//! Account, session and ledger logic for the storefront, as a library. The
//! caller (the `pshop` CLI, or an HTTP layer) owns transport concerns and
//! talks to the core through [`state::AppState`].
//!
//! # Flow
//!
//! 1. [`services::sessions::SessionManager::login`] verifies credentials and
//!    issues a session ID plus a CSRF token
//! 2. [`services::sessions::SessionManager::validate`] checks both on every
//!    request and yields a [`models::Principal`]
//! 3. [`services::ledger::Ledger`] runs deposits and purchases for
//!    `principal.user_id` inside one transaction each

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod background;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
