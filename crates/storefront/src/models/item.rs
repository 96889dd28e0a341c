//! Item reference data.

use serde::Serialize;

use pennyshop_core::{ItemId, Money};

/// A purchasable item. Owned outside the core; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    /// Current price in minor units (>= 0).
    pub price: Money,
}
