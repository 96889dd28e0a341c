//! Purchase ledger entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pennyshop_core::{ItemId, Money, PurchaseId, UserId};

/// A committed purchase. Append-only; never updated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Item price snapshotted inside the purchase transaction.
    pub price_paid: Money,
    pub purchased_at: DateTime<Utc>,
}

/// Purchase history row joined with the user and item names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPurchase {
    pub username: String,
    pub item_name: String,
    pub price_paid: Money,
    pub purchased_at: DateTime<Utc>,
}
