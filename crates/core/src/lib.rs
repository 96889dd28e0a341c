//! Pennyshop Core - Shared domain types.
//!
//! This crate provides the types shared by every Pennyshop component:
//! - `storefront` - Account, session and ledger core
//! - `cli` - Command-line caller, migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no
//! randomness. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, usernames,
//!   opaque tokens and session states

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
