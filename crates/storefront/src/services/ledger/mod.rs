//! Ledger engine.
//!
//! Every balance mutation goes through one transaction boundary:
//!
//! 1. `begin` a ledger transaction
//! 2. lock and read the rows involved (item before user, always)
//! 3. check the business rule against the locked values
//! 4. stage the writes
//! 5. `commit`
//!
//! Returning early at any step drops the transaction, which rolls back
//! whatever was staged. The whole operation is bounded by the configured
//! transaction timeout.

mod error;

pub use error::LedgerError;

use std::future::Future;

use tracing::{info, instrument, warn};

use pennyshop_core::{ItemId, Money, UserId};

use crate::config::LedgerConfig;
use crate::db::{ItemStore, LedgerStore, LedgerTx};
use crate::models::{Item, Purchase, UserPurchase};

/// Balance and purchase service.
pub struct Ledger<'a, S> {
    store: &'a S,
    config: &'a LedgerConfig,
}

impl<'a, S> Ledger<'a, S>
where
    S: LedgerStore + ItemStore,
{
    /// Create a new ledger service.
    #[must_use]
    pub const fn new(store: &'a S, config: &'a LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Run `op` under the transaction timeout.
    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        tokio::time::timeout(self.config.tx_timeout, op)
            .await
            .map_err(|_| {
                warn!(timeout = ?self.config.tx_timeout, "ledger operation timed out");
                LedgerError::Timeout
            })?
    }

    /// Current balance of a user.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UserNotFound` if the user doesn't exist.
    #[instrument(skip(self))]
    pub async fn balance(&self, user_id: UserId) -> Result<Money, LedgerError> {
        self.bounded(async {
            self.store
                .balance(user_id)
                .await?
                .ok_or(LedgerError::UserNotFound)
        })
        .await
    }

    /// Add `amount` to a user's balance and return the new balance.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidAmount` if `amount` is not positive or the
    /// new balance would exceed [`Money::MAX_BALANCE`].
    /// Returns `LedgerError::UserNotFound` if the user doesn't exist.
    #[instrument(skip(self))]
    pub async fn deposit(&self, user_id: UserId, amount: Money) -> Result<Money, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(format!(
                "deposit must be positive, got {amount}"
            )));
        }

        let balance = self
            .bounded(async {
                let mut tx = self.store.begin().await?;

                let balance = tx
                    .lock_balance(user_id)
                    .await?
                    .ok_or(LedgerError::UserNotFound)?;

                let new_balance = balance
                    .checked_add(amount)
                    .filter(|b| *b <= Money::MAX_BALANCE)
                    .ok_or_else(|| {
                        LedgerError::InvalidAmount(format!(
                            "balance would exceed {}",
                            Money::MAX_BALANCE
                        ))
                    })?;

                tx.set_balance(user_id, new_balance).await?;
                tx.commit().await?;
                Ok(new_balance)
            })
            .await?;

        info!(user_id = %user_id, amount = %amount, balance = %balance, "deposit committed");
        Ok(balance)
    }

    /// Buy one item at its current price.
    ///
    /// The price is read under the item's row lock and recorded on the
    /// purchase, so later price changes do not affect it.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ItemNotFound` if the item doesn't exist.
    /// Returns `LedgerError::UserNotFound` if the user doesn't exist.
    /// Returns `LedgerError::InsufficientFunds` if the balance is below the price.
    #[instrument(skip(self))]
    pub async fn purchase(&self, user_id: UserId, item_id: ItemId) -> Result<Purchase, LedgerError> {
        let purchase = self
            .bounded(async {
                let mut tx = self.store.begin().await?;

                let price = tx
                    .lock_item_price(item_id)
                    .await?
                    .ok_or(LedgerError::ItemNotFound)?;

                let balance = tx
                    .lock_balance(user_id)
                    .await?
                    .ok_or(LedgerError::UserNotFound)?;

                let Some(new_balance) = balance.checked_sub(price).filter(|b| !b.is_negative())
                else {
                    return Err(LedgerError::InsufficientFunds { balance, price });
                };

                tx.set_balance(user_id, new_balance).await?;
                let purchase = tx.insert_purchase(user_id, item_id, price).await?;
                tx.commit().await?;
                Ok(purchase)
            })
            .await?;

        info!(
            user_id = %user_id,
            item_id = %item_id,
            price = %purchase.price_paid,
            purchase_id = %purchase.id,
            "purchase committed"
        );
        Ok(purchase)
    }

    /// Purchase history of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` on storage failure.
    #[instrument(skip(self))]
    pub async fn purchases(&self, user_id: UserId) -> Result<Vec<UserPurchase>, LedgerError> {
        self.bounded(async { Ok(self.store.purchases(user_id).await?) })
            .await
    }

    /// All items, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Repository` on storage failure.
    pub async fn items(&self) -> Result<Vec<Item>, LedgerError> {
        self.bounded(async { Ok(self.store.list_items().await?) })
            .await
    }

    /// Look up one item.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ItemNotFound` if the item doesn't exist.
    pub async fn item(&self, item_id: ItemId) -> Result<Item, LedgerError> {
        self.bounded(async {
            self.store
                .get_item(item_id)
                .await?
                .ok_or(LedgerError::ItemNotFound)
        })
        .await
    }
}
