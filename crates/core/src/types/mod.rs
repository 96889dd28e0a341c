//! Core types for Pennyshop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;
pub mod token;
pub mod username;

pub use id::*;
pub use money::{Money, MoneyError};
pub use status::SessionState;
pub use token::{CsrfToken, SessionId};
pub use username::{Username, UsernameError};
