//! Ledger error types.

use thiserror::Error;

use pennyshop_core::Money;

use crate::db::RepositoryError;

/// Errors that can occur during balance and purchase operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount is zero, negative, or would overflow the balance column.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// No such user.
    #[error("user not found")]
    UserNotFound,

    /// No such item.
    #[error("item not found")]
    ItemNotFound,

    /// Balance is lower than the item price.
    #[error("insufficient funds: balance {balance}, price {price}")]
    InsufficientFunds {
        /// Balance at the time of the attempt, in minor units.
        balance: Money,
        /// Item price at the time of the attempt, in minor units.
        price: Money,
    },

    /// The operation did not finish within the transaction timeout.
    #[error("ledger operation timed out")]
    Timeout,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for LedgerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Timeout(_) => Self::Timeout,
            other => Self::Repository(other),
        }
    }
}
