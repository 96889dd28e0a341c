//! Domain models for the storefront core.
//!
//! These are validated domain objects, separate from database row types.

pub mod item;
pub mod purchase;
pub mod session;
pub mod user;

pub use item::Item;
pub use purchase::{Purchase, UserPurchase};
pub use session::{NewSession, Principal, Session};
pub use user::{StoredCredentials, User};
